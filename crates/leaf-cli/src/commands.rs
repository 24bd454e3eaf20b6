//! Command implementations

use anyhow::{bail, Result};
use leaf_client::{Command, LeafClient};

use crate::output::{CommandReport, OutputContext, OutputFormat};

/// Log in and print the credentials so later invocations can reuse them
pub async fn login(client: &LeafClient, ctx: &OutputContext) -> Result<()> {
    ctx.info("Logging in...");

    let Ok(credentials) = client.login().await else {
        report_failure(ctx, "login");
        bail!("Login failed");
    };

    let vehicle_name = client.vehicle_name();
    ctx.success("Logged in");
    ctx.report(&CommandReport {
        command: "login",
        ok: true,
        payload: None,
        credentials: Some(&credentials),
        vehicle_name: vehicle_name.as_deref(),
    });
    Ok(())
}

/// Send one command and print its payload
pub async fn run(client: &LeafClient, command: Command, ctx: &OutputContext) -> Result<()> {
    ctx.info(progress_message(command));

    let name = command.to_string();
    let Ok(payload) = client.send(command).await else {
        report_failure(ctx, &name);
        bail!("Command {} failed", name);
    };

    ctx.success(success_message(command));
    ctx.report(&CommandReport {
        command: &name,
        ok: true,
        payload: payload.as_ref(),
        credentials: None,
        vehicle_name: None,
    });
    Ok(())
}

fn report_failure(ctx: &OutputContext, command: &str) {
    if ctx.format == OutputFormat::Text {
        ctx.error("I can't communicate with the car at the moment");
        return;
    }
    ctx.report(&CommandReport {
        command,
        ok: false,
        payload: None,
        credentials: None,
        vehicle_name: None,
    });
}

fn progress_message(command: Command) -> &'static str {
    match command {
        Command::BatteryStatus => "Asking the car for its battery status...",
        Command::RequestUpdate => "Asking the car to send its latest data...",
        _ => "Telling the car...",
    }
}

fn success_message(command: Command) -> &'static str {
    match command {
        Command::BatteryStatus => "Battery status received",
        Command::Preheat => "The car is warming up",
        Command::Cooling => "The car is cooling down",
        Command::ClimateOff => "Climate control is off",
        Command::StartCharging => "The car is now charging",
        Command::RequestUpdate => "Update requested; the car will report shortly",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_has_messages() {
        for command in Command::all() {
            assert!(!progress_message(command).is_empty());
            assert!(!success_message(command).is_empty());
        }
    }
}
