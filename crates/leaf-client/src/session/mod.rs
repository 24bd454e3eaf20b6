//! Session management for the gateway
//!
//! This module owns the authentication state machine: the two-step
//! initialise/login exchange, the cached credentials it produces, and the
//! hooks a caller uses to seed or discard them.

mod login;
mod manager;

use serde::{Deserialize, Serialize};

use crate::error::{LeafClientError, Result};

pub use manager::{LoginFailureHandler, SessionManager};

/// Upstream-issued identifiers for an authenticated session.
///
/// Both fields are stored percent-encoded, ready to be placed in a form
/// body, and are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawCredentials")]
pub struct Credentials {
    session_id: String,
    vehicle_id: String,
}

impl Credentials {
    /// Build from values that are already percent-encoded
    pub fn new(session_id: impl Into<String>, vehicle_id: impl Into<String>) -> Result<Self> {
        let session_id = session_id.into();
        let vehicle_id = vehicle_id.into();
        if session_id.is_empty() {
            return Err(LeafClientError::InvalidCredentials(
                "session id is empty".into(),
            ));
        }
        if vehicle_id.is_empty() {
            return Err(LeafClientError::InvalidCredentials(
                "vehicle id is empty".into(),
            ));
        }
        Ok(Self {
            session_id,
            vehicle_id,
        })
    }

    /// Build from raw values as they appear in a login response
    pub fn from_upstream(session_id: &str, vin: &str) -> Result<Self> {
        Self::new(urlencoding::encode(session_id), urlencoding::encode(vin))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredentials {
    session_id: String,
    vehicle_id: String,
}

impl TryFrom<RawCredentials> for Credentials {
    type Error = LeafClientError;

    fn try_from(raw: RawCredentials) -> Result<Self> {
        Credentials::new(raw.session_id, raw.vehicle_id)
    }
}

/// An authenticated context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credentials: Credentials,
    /// Vehicle nickname, when the login response carried one
    pub vehicle_name: Option<String>,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            vehicle_name: None,
        }
    }
}

/// Authentication state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    /// Login exchange in flight
    Authenticating,
    Authenticated(Session),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_reject_empty() {
        assert!(Credentials::new("", "V1").is_err());
        assert!(Credentials::new("S1", "").is_err());
        assert!(Credentials::new("S1", "V1").is_ok());
    }

    #[test]
    fn test_credentials_from_upstream_encodes() {
        let creds = Credentials::from_upstream("ab+c/d==", "SJNFAAZE0U1234567").unwrap();
        assert_eq!(creds.session_id(), "ab%2Bc%2Fd%3D%3D");
        assert_eq!(creds.vehicle_id(), "SJNFAAZE0U1234567");
    }

    #[test]
    fn test_credentials_serde_round_trip_names() {
        let creds = Credentials::new("S1", "V1").unwrap();
        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json, serde_json::json!({"sessionId": "S1", "vehicleId": "V1"}));

        let back: Credentials = serde_json::from_value(json).unwrap();
        assert_eq!(back, creds);
    }

    #[test]
    fn test_credentials_deserialize_rejects_empty() {
        let result: std::result::Result<Credentials, _> =
            serde_json::from_str(r#"{"sessionId":"","vehicleId":"V1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_state_accessors() {
        assert!(!SessionState::default().is_authenticated());
        assert!(SessionState::Authenticating.session().is_none());

        let session = Session::new(Credentials::new("S1", "V1").unwrap());
        let state = SessionState::Authenticated(session.clone());
        assert!(state.is_authenticated());
        assert_eq!(state.session(), Some(&session));
    }
}
