//! Test utilities for leaf-client
//!
//! Provides a scripted stand-in for the telematics gateway that records
//! every request it receives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::{LeafConfig, Region};
use crate::Result;

/// Path prefix the mock serves endpoints under
pub const MOCK_BASE_PATH: &str = "/gdc/";

/// Session key the mock hands out from `InitialApp.php`
pub const MOCK_SESSION_KEY: &str = "uyI5Dj9g8VCOFDnBRUbr3g";

/// A request as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub body: String,
    pub content_type: Option<String>,
}

/// Scripted reply for one endpoint
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
    pub location: Option<String>,
}

impl MockResponse {
    /// 200 with a JSON body
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: None,
            location: None,
        }
    }

    /// 200 with `{"status":200}` and nothing else
    pub fn ok() -> Self {
        Self::json(json!({ "status": 200 }))
    }

    /// 200 with an envelope status other than 200
    pub fn rejected(status: i64) -> Self {
        Self::json(json!({ "status": status }))
    }

    /// 200 with no body at all
    pub fn empty() -> Self {
        Self {
            status: 200,
            body: String::new(),
            delay: None,
            location: None,
        }
    }

    /// Transport-level failure
    pub fn http_status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            delay: None,
            location: None,
        }
    }

    /// 3xx pointing at another endpoint on the mock
    pub fn redirect(status: u16, endpoint: &str) -> Self {
        Self {
            status,
            body: String::new(),
            delay: None,
            location: Some(format!("{}{}", MOCK_BASE_PATH, endpoint)),
        }
    }

    /// Hold the reply back
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<HashMap<String, MockResponse>>,
}

/// Mock gateway that automatically shuts down when dropped
pub struct MockUpstream {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MockUpstream {
    /// Start an empty mock; every endpoint answers 404 until scripted
    pub async fn start() -> Result<Self> {
        let state = Arc::new(MockState::default());

        let router = axum::Router::new()
            .route("/gdc/{endpoint}", post(handle))
            .with_state(state.clone());

        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Start a mock where login and every command succeed
    pub async fn start_happy() -> Result<Self> {
        let mock = Self::start().await?;
        mock.script_login(json!({
            "status": 200,
            "VehicleInfoList": {
                "vehicleInfo": [{
                    "custom_sessionid": "SESSION+1/==",
                    "vin": "SJNFAAZE0U6000001",
                    "nickname": "Leafy"
                }]
            }
        }));
        for endpoint in [
            "BatteryStatusRecordsRequest.php",
            "ACRemoteRequest.php",
            "ACRemoteOffRequest.php",
            "BatteryRemoteChargingRequest.php",
            "BatteryStatusCheckRequest.php",
        ] {
            mock.respond(endpoint, MockResponse::ok());
        }
        Ok(mock)
    }

    /// Script both halves of the login exchange
    pub fn script_login(&self, login_response: Value) {
        self.respond(
            "InitialApp.php",
            MockResponse::json(json!({
                "status": 200,
                "message": "success",
                "baseprm": MOCK_SESSION_KEY
            })),
        );
        self.respond("UserLoginRequest.php", MockResponse::json(login_response));
    }

    /// Set the reply for an endpoint, replacing any earlier one
    pub fn respond(&self, endpoint: &str, response: MockResponse) {
        self.state
            .responses
            .lock()
            .insert(endpoint.to_string(), response);
    }

    /// Get the base URL of the mock gateway
    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.addr, MOCK_BASE_PATH)
    }

    /// A configuration pointing at this mock
    pub fn config(&self) -> LeafConfig {
        LeafConfig::new("user@example.com", "secret", Region::Europe).with_base_url(self.base_url())
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Requests received for one endpoint
    pub fn requests_to(&self, endpoint: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.endpoint == endpoint)
            .collect()
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    Path(endpoint): Path<String>,
    headers: axum::http::HeaderMap,
    body: String,
) -> Response {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    state.requests.lock().push(RecordedRequest {
        endpoint: endpoint.clone(),
        body,
        content_type,
    });

    let scripted = state.responses.lock().get(&endpoint).cloned();
    let Some(reply) = scripted else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match reply.location {
        Some(location) => (
            status,
            [(axum::http::header::LOCATION, location)],
            reply.body,
        )
            .into_response(),
        None => (status, reply.body).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_response_builders() {
        assert_eq!(MockResponse::ok().body, r#"{"status":200}"#);
        assert_eq!(MockResponse::http_status(503).status, 503);
        assert!(MockResponse::empty().body.is_empty());
        assert_eq!(
            MockResponse::redirect(307, "Other.php").location.as_deref(),
            Some("/gdc/Other.php")
        );
        assert_eq!(
            MockResponse::ok().delayed(Duration::from_millis(5)).delay,
            Some(Duration::from_millis(5))
        );
    }

    #[tokio::test]
    async fn test_base_url_format() {
        let mock = MockUpstream::start().await.unwrap();
        assert_eq!(mock.base_url(), format!("http://{}/gdc/", mock.addr));
        assert!(mock.requests().is_empty());
    }
}
