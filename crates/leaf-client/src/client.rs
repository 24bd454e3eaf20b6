//! Leaf command client

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::budget::TimeBudget;
use crate::config::LeafConfig;
use crate::encrypt::{BlowfishEncryptor, Encryptor};
use crate::error::{CommandFailed, LeafClientError, Result};
use crate::executor::RequestExecutor;
use crate::request::CommandRequest;
use crate::session::{Credentials, LoginFailureHandler, SessionManager, SessionState};

/// Outcome of a command: the upstream payload, or a bare failure
pub type CommandResult = std::result::Result<Option<Value>, CommandFailed>;

/// The fixed set of authenticated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Latest battery status records
    BatteryStatus,
    /// Switch climate control on to warm the cabin
    Preheat,
    /// Switch climate control on to cool the cabin
    Cooling,
    /// Switch climate control off
    ClimateOff,
    /// Start charging now
    StartCharging,
    /// Ask the car to upload fresh data
    RequestUpdate,
}

impl Command {
    pub fn all() -> [Command; 6] {
        [
            Command::BatteryStatus,
            Command::Preheat,
            Command::Cooling,
            Command::ClimateOff,
            Command::StartCharging,
            Command::RequestUpdate,
        ]
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Command::BatteryStatus => "BatteryStatusRecordsRequest.php",
            // The gateway has no separate cooling endpoint; the car picks
            // heating or cooling itself.
            Command::Preheat | Command::Cooling => "ACRemoteRequest.php",
            Command::ClimateOff => "ACRemoteOffRequest.php",
            Command::StartCharging => "BatteryRemoteChargingRequest.php",
            Command::RequestUpdate => "BatteryStatusCheckRequest.php",
        }
    }

    /// Remote-control commands also carry the account user name
    pub fn is_control(&self) -> bool {
        !matches!(self, Command::BatteryStatus)
    }

    /// Build the request for this command
    pub fn request(&self, config: &LeafConfig, credentials: &Credentials) -> CommandRequest {
        let mut request = CommandRequest::new(self.endpoint());
        if self.is_control() {
            request = request.param("UserId", &config.username);
        }
        request
            .encoded_param("custom_sessionid", credentials.session_id())
            .param("RegionCode", config.region.code())
            .encoded_param("VIN", credentials.vehicle_id())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::BatteryStatus => "battery-status",
            Command::Preheat => "preheat",
            Command::Cooling => "cooling",
            Command::ClimateOff => "climate-off",
            Command::StartCharging => "start-charging",
            Command::RequestUpdate => "request-update",
        };
        f.write_str(name)
    }
}

/// Leaf telematics client
///
/// Every command makes sure a session exists (logging in at most once) and
/// then sends exactly one request. Clones share the same session.
#[derive(Clone)]
pub struct LeafClient {
    config: Arc<LeafConfig>,
    executor: Arc<RequestExecutor>,
    session: Arc<SessionManager>,
}

impl LeafClient {
    /// Create a client with no time budget and no seeded session
    pub fn new(config: LeafConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: LeafConfig) -> LeafClientBuilder {
        LeafClientBuilder {
            config,
            budget: None,
            encryptor: None,
            on_login_failure: None,
            credentials: None,
        }
    }

    pub fn config(&self) -> &LeafConfig {
        &self.config
    }

    /// Get a reference to the session manager
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Credentials to carry into a later client
    pub fn credentials(&self) -> Option<Credentials> {
        self.session.credentials()
    }

    /// Vehicle nickname learned at login
    pub fn vehicle_name(&self) -> Option<String> {
        self.session.vehicle_name()
    }

    /// Discard the session so the next command logs in again
    pub fn invalidate_session(&self) {
        self.session.invalidate();
    }

    /// Log in now without sending a command
    pub async fn login(&self) -> std::result::Result<Credentials, CommandFailed> {
        Ok(self.session.ensure_authenticated().await?)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Latest battery status
    pub async fn battery_status(&self) -> CommandResult {
        self.send(Command::BatteryStatus).await
    }

    /// Remote pre-heat
    pub async fn preheat(&self) -> CommandResult {
        self.send(Command::Preheat).await
    }

    /// Remote cooling
    pub async fn cooling(&self) -> CommandResult {
        self.send(Command::Cooling).await
    }

    /// Climate control off
    pub async fn climate_off(&self) -> CommandResult {
        self.send(Command::ClimateOff).await
    }

    /// Start charging
    pub async fn start_charging(&self) -> CommandResult {
        self.send(Command::StartCharging).await
    }

    /// Ask the car to refresh the data held upstream
    pub async fn request_update(&self) -> CommandResult {
        self.send(Command::RequestUpdate).await
    }

    /// Authenticate if needed, then send one request for `command`
    #[instrument(skip(self, command), fields(command = %command))]
    pub async fn send(&self, command: Command) -> CommandResult {
        let credentials = match self.session.ensure_authenticated().await {
            Ok(credentials) => credentials,
            Err(e) => {
                log_failure(command, "login failed", &e);
                return Err(CommandFailed);
            }
        };
        let request = command.request(&self.config, &credentials);

        match self.executor.execute(&request).await {
            Ok(payload) => {
                info!("Command {} succeeded", command);
                Ok(payload)
            }
            Err(e) => {
                log_failure(command, "request failed", &e);
                Err(CommandFailed)
            }
        }
    }
}

/// Budget exhaustion logs at info, anything else at warn
fn log_failure(command: Command, stage: &str, error: &LeafClientError) {
    if error.is_budget() {
        info!("Command {} gave up, {}: {}", command, stage, error);
    } else {
        warn!("Command {} failed, {}: {}", command, stage, error);
    }
}

/// Configures a [`LeafClient`] before any command is issued
pub struct LeafClientBuilder {
    config: LeafConfig,
    budget: Option<Arc<dyn TimeBudget>>,
    encryptor: Option<Arc<dyn Encryptor>>,
    on_login_failure: Option<LoginFailureHandler>,
    credentials: Option<Credentials>,
}

impl LeafClientBuilder {
    /// Enforce a time budget on every request
    pub fn time_budget(mut self, budget: impl TimeBudget + 'static) -> Self {
        self.budget = Some(Arc::new(budget));
        self
    }

    /// Called once per failed login attempt
    pub fn on_login_failure(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_login_failure = Some(Arc::new(handler));
        self
    }

    /// Start with credentials from an earlier session
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the password encryption
    pub fn encryptor(mut self, encryptor: impl Encryptor + 'static) -> Self {
        self.encryptor = Some(Arc::new(encryptor));
        self
    }

    pub fn build(self) -> Result<LeafClient> {
        self.config.validate()?;

        let mut executor = RequestExecutor::new(self.config.parsed_base_url()?)?;
        if let Some(budget) = self.budget {
            executor = executor.with_budget(budget);
        }
        let executor = Arc::new(executor);

        let config = Arc::new(self.config);
        let encryptor = self
            .encryptor
            .unwrap_or_else(|| Arc::new(BlowfishEncryptor) as Arc<dyn Encryptor>);

        let mut session = SessionManager::new(executor.clone(), config.clone(), encryptor);
        if let Some(handler) = self.on_login_failure {
            session = session.with_login_failure(handler);
        }
        if let Some(credentials) = self.credentials {
            session = session.with_credentials(credentials);
        }

        Ok(LeafClient {
            config,
            executor,
            session: Arc::new(session),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use pretty_assertions::assert_eq;

    fn config() -> LeafConfig {
        LeafConfig::new("me@example.com", "secret", Region::Europe)
    }

    #[test]
    fn test_status_request_has_no_user() {
        let creds = Credentials::new("S1", "V1").unwrap();
        let request = Command::BatteryStatus.request(&config(), &creds);
        assert_eq!(request.endpoint(), "BatteryStatusRecordsRequest.php");
        assert_eq!(request.form_body(), "custom_sessionid=S1&RegionCode=NE&VIN=V1");
    }

    #[test]
    fn test_control_requests_carry_user() {
        let creds = Credentials::new("S1", "V1").unwrap();
        for command in Command::all().into_iter().filter(Command::is_control) {
            let request = command.request(&config(), &creds);
            assert_eq!(
                request.form_body(),
                "UserId=me%40example.com&custom_sessionid=S1&RegionCode=NE&VIN=V1",
                "{}",
                command
            );
        }
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(Command::Preheat.endpoint(), Command::Cooling.endpoint());
        assert_eq!(Command::ClimateOff.endpoint(), "ACRemoteOffRequest.php");
        assert_eq!(Command::StartCharging.endpoint(), "BatteryRemoteChargingRequest.php");
        assert_eq!(Command::RequestUpdate.endpoint(), "BatteryStatusCheckRequest.php");
    }

    #[test]
    fn test_client_creation() {
        let client = LeafClient::new(config());
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let client = LeafClient::new(config().with_base_url("not a url"));
        assert!(client.is_err());
        let client = LeafClient::new(LeafConfig::new("", "secret", Region::Europe));
        assert!(client.is_err());
    }

    #[test]
    fn test_seeded_client_reports_credentials() {
        let creds = Credentials::new("S1", "V1").unwrap();
        let client = LeafClient::builder(config())
            .credentials(creds.clone())
            .build()
            .unwrap();
        assert_eq!(client.credentials(), Some(creds));
        assert!(client.session_state().is_authenticated());

        client.invalidate_session();
        assert_eq!(client.credentials(), None);
    }
}
