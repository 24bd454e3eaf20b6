//! Output formatting for leaf-cli (text, json)

use clap::ValueEnum;
use colored::Colorize;
use leaf_client::Credentials;
use serde::Serialize;
use serde_json::Value;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Machine-readable result of one invocation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReport<'a> {
    pub command: &'a str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<&'a Credentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_name: Option<&'a str>,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet && self.format == OutputFormat::Text {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet && self.format == OutputFormat::Text {
            println!("{}", msg);
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print the outcome of a command in the configured format
    pub fn report(&self, report: &CommandReport<'_>) {
        match self.format {
            OutputFormat::Text => {
                if let Some(name) = report.vehicle_name {
                    self.info(&format!("Vehicle: {}", name.bold()));
                }
                if let Some(credentials) = report.credentials {
                    println!("session-id: {}", credentials.session_id());
                    println!("vin: {}", credentials.vehicle_id());
                }
                if let Some(payload) = report.payload {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(payload).unwrap_or_else(|_| "{}".to_string())
                    );
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }
}
