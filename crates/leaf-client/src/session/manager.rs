//! Authentication state machine

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::login::{parse_initial_app, parse_login};
use super::{Credentials, Session, SessionState};
use crate::config::LeafConfig;
use crate::encrypt::Encryptor;
use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::request::CommandRequest;

const INITIAL_APP_ENDPOINT: &str = "InitialApp.php";
const LOGIN_ENDPOINT: &str = "UserLoginRequest.php";
const LANGUAGE: &str = "en-US";

/// Invoked once for every failed login attempt
pub type LoginFailureHandler = Arc<dyn Fn() + Send + Sync>;

/// Owns the current session and is the only thing that mutates it.
///
/// Logins are single-flight: callers that arrive while an exchange is in
/// progress wait for it and reuse its credentials.
pub struct SessionManager {
    executor: Arc<RequestExecutor>,
    config: Arc<LeafConfig>,
    encryptor: Arc<dyn Encryptor>,
    state: RwLock<SessionState>,
    login_lock: Mutex<()>,
    on_login_failure: Option<LoginFailureHandler>,
}

impl SessionManager {
    pub fn new(
        executor: Arc<RequestExecutor>,
        config: Arc<LeafConfig>,
        encryptor: Arc<dyn Encryptor>,
    ) -> Self {
        Self {
            executor,
            config,
            encryptor,
            state: RwLock::new(SessionState::Unauthenticated),
            login_lock: Mutex::new(()),
            on_login_failure: None,
        }
    }

    /// Register the login failure callback
    pub fn with_login_failure(mut self, handler: LoginFailureHandler) -> Self {
        self.on_login_failure = Some(handler);
        self
    }

    /// Start out authenticated with credentials carried over by the caller
    pub fn with_credentials(self, credentials: Credentials) -> Self {
        self.seed(credentials);
        self
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Cached credentials, if authenticated
    pub fn credentials(&self) -> Option<Credentials> {
        self.state.read().session().map(|s| s.credentials.clone())
    }

    /// Vehicle nickname from the last login
    pub fn vehicle_name(&self) -> Option<String> {
        self.state
            .read()
            .session()
            .and_then(|s| s.vehicle_name.clone())
    }

    /// Replace the session with externally cached credentials
    pub fn seed(&self, credentials: Credentials) {
        debug!("Seeding session with stored credentials");
        *self.state.write() = SessionState::Authenticated(Session::new(credentials));
    }

    /// Drop cached credentials so the next command logs in again
    pub fn invalidate(&self) {
        info!("Session invalidated");
        *self.state.write() = SessionState::Unauthenticated;
    }

    /// Return cached credentials, logging in first if there are none
    #[instrument(skip(self))]
    pub async fn ensure_authenticated(&self) -> Result<Credentials> {
        if let Some(credentials) = self.credentials() {
            return Ok(credentials);
        }

        let _guard = self.login_lock.lock().await;

        // Another caller may have finished logging in while we waited
        if let Some(credentials) = self.credentials() {
            debug!("Reusing credentials from concurrent login");
            return Ok(credentials);
        }

        let attempt = LoginAttempt::begin(&self.state);

        match self.login().await {
            Ok(session) => {
                info!(vehicle = ?session.vehicle_name, "Logged in");
                Ok(attempt.succeed(session))
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                attempt.fail();
                if let Some(handler) = &self.on_login_failure {
                    handler();
                }
                Err(e)
            }
        }
    }

    async fn login(&self) -> Result<Session> {
        let key = self.initial_key().await?;
        let password = self.encryptor.encrypt(&self.config.password, &key)?;

        let request = CommandRequest::new(LOGIN_ENDPOINT)
            .param("UserId", &self.config.username)
            .param("initial_app_strings", &self.config.app_strings)
            .param("RegionCode", self.config.region.code())
            .param("Password", &password);

        let payload = self.executor.execute(&request).await?;
        parse_login(payload)
    }

    async fn initial_key(&self) -> Result<String> {
        let request = CommandRequest::new(INITIAL_APP_ENDPOINT)
            .param("initial_app_strings", &self.config.app_strings)
            .param("RegionCode", self.config.region.code())
            .param("lg", LANGUAGE);

        let payload = self.executor.execute(&request).await?;
        parse_initial_app(payload)
    }
}

/// Marks the session as `Authenticating` for the lifetime of one login
/// exchange.
///
/// Results are only written while the state is still `Authenticating`, so a
/// `seed` or `invalidate` made during the exchange wins. Dropping the attempt
/// unfinished (the caller's future was cancelled) returns the state to
/// `Unauthenticated`.
struct LoginAttempt<'a> {
    state: &'a RwLock<SessionState>,
    finished: bool,
}

impl<'a> LoginAttempt<'a> {
    fn begin(state: &'a RwLock<SessionState>) -> Self {
        *state.write() = SessionState::Authenticating;
        Self {
            state,
            finished: false,
        }
    }

    /// Store the new session and return the credentials the caller should use
    fn succeed(mut self, session: Session) -> Credentials {
        self.finished = true;
        let mut state = self.state.write();
        match &*state {
            SessionState::Authenticated(current) => {
                debug!("Session was seeded during login, keeping seeded credentials");
                current.credentials.clone()
            }
            SessionState::Unauthenticated => {
                debug!("Session was invalidated during login, not caching result");
                session.credentials
            }
            SessionState::Authenticating => {
                let credentials = session.credentials.clone();
                *state = SessionState::Authenticated(session);
                credentials
            }
        }
    }

    fn fail(mut self) {
        self.finished = true;
        self.reset();
    }

    fn reset(&self) {
        let mut state = self.state.write();
        if matches!(*state, SessionState::Authenticating) {
            *state = SessionState::Unauthenticated;
        }
    }
}

impl Drop for LoginAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Login abandoned before completion");
            self.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use crate::encrypt::BlowfishEncryptor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    fn manager_without_network() -> SessionManager {
        let config = LeafConfig::new("user", "secret", Region::Europe)
            .with_base_url("http://127.0.0.1:9/gdc/");
        let executor = RequestExecutor::new(Url::parse(&config.base_url).unwrap())
            .unwrap()
            .with_budget(Arc::new(|| 0_i64));
        SessionManager::new(
            Arc::new(executor),
            Arc::new(config),
            Arc::new(BlowfishEncryptor),
        )
    }

    #[tokio::test]
    async fn test_seeded_manager_skips_login() {
        let manager =
            manager_without_network().with_credentials(Credentials::new("S1", "V1").unwrap());
        assert!(manager.state().is_authenticated());

        let creds = manager.ensure_authenticated().await.unwrap();
        assert_eq!(creds.session_id(), "S1");
        assert_eq!(creds.vehicle_id(), "V1");
    }

    #[tokio::test]
    async fn test_failed_login_resets_state_and_notifies_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let manager = manager_without_network().with_login_failure(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(manager.ensure_authenticated().await.is_err());
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(manager.ensure_authenticated().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_clears_credentials() {
        let manager =
            manager_without_network().with_credentials(Credentials::new("S1", "V1").unwrap());
        manager.invalidate();
        assert_eq!(manager.credentials(), None);
        assert_eq!(manager.vehicle_name(), None);
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_abandoned_login_attempt_resets_state() {
        let manager = manager_without_network();
        {
            let _attempt = LoginAttempt::begin(&manager.state);
            assert_eq!(manager.state(), SessionState::Authenticating);
        }
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_login_attempt_keeps_state_seeded_meanwhile() {
        let manager = manager_without_network();
        let attempt = LoginAttempt::begin(&manager.state);
        manager.seed(Credentials::new("SEEDED", "VS").unwrap());

        let creds = attempt.succeed(Session::new(Credentials::new("LOGIN", "VL").unwrap()));
        assert_eq!(creds.session_id(), "SEEDED");
        assert_eq!(manager.credentials().unwrap().session_id(), "SEEDED");

        let attempt = LoginAttempt::begin(&manager.state);
        manager.seed(Credentials::new("SEEDED2", "VS").unwrap());
        attempt.fail();
        assert_eq!(manager.credentials().unwrap().session_id(), "SEEDED2");
    }

    #[test]
    fn test_login_attempt_respects_invalidate_meanwhile() {
        let manager = manager_without_network();
        let attempt = LoginAttempt::begin(&manager.state);
        manager.invalidate();

        let creds = attempt.succeed(Session::new(Credentials::new("LOGIN", "VL").unwrap()));
        assert_eq!(creds.session_id(), "LOGIN");
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }
}
