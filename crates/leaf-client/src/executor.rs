//! Single-request execution against the gateway

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::budget::TimeBudget;
use crate::error::{LeafClientError, Result};
use crate::request::CommandRequest;

/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Envelope status the gateway uses for success
const UPSTREAM_OK: i64 = 200;

/// Performs one HTTP exchange per call.
///
/// Holds no session state. The time budget, when present, is consulted
/// before every request and becomes that request's timeout.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    base_url: Url,
    budget: Option<Arc<dyn TimeBudget>>,
}

impl RequestExecutor {
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url,
            budget: None,
        })
    }

    /// Enforce a time budget on every request
    pub fn with_budget(mut self, budget: Arc<dyn TimeBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Milliseconds left, or `None` when no budget is configured
    pub fn remaining_millis(&self) -> Option<i64> {
        self.budget.as_ref().map(|b| b.remaining_millis())
    }

    /// Send one request and classify the outcome.
    ///
    /// `Ok(None)` is a successful call that carried no payload.
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint()))]
    pub async fn execute(&self, request: &CommandRequest) -> Result<Option<Value>> {
        let endpoint = request.endpoint();

        let timeout = match self.remaining_millis() {
            Some(ms) if ms <= 0 => {
                warn!("No time left for {}", endpoint);
                return Err(LeafClientError::BudgetExhausted(endpoint.to_string()));
            }
            Some(ms) => Some(Duration::from_millis(ms as u64)),
            None => None,
        };

        let url = self.base_url.join(endpoint)?;
        let body = request.form_body();

        let mut builder = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CONTENT_LENGTH, body.len())
            .body(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                "Failed to send request {} ({})",
                endpoint,
                status
            );
            return Err(LeafClientError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| classify_transport(endpoint, e))?;

        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Successful request {}",
            endpoint
        );

        parse_envelope(endpoint, &text)
    }
}

fn classify_transport(endpoint: &str, error: reqwest::Error) -> LeafClientError {
    if error.is_timeout() {
        warn!("Request {} timed out and aborting", endpoint);
        LeafClientError::Timeout(endpoint.to_string())
    } else {
        warn!("Request {} failed: {}", endpoint, error);
        LeafClientError::HttpError(error)
    }
}

/// Check the status the gateway embeds inside a 2xx response.
///
/// An empty body passes as `None`. So does an envelope holding nothing but
/// its status.
pub(crate) fn parse_envelope(endpoint: &str, body: &str) -> Result<Option<Value>> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| LeafClientError::ParseError(format!("{}: {}", endpoint, e)))?;

    let status = value.get("status").and_then(|s| match s {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    if status != Some(UPSTREAM_OK) {
        warn!(?status, "Request {} rejected by upstream", endpoint);
        return Err(LeafClientError::rejected(endpoint, status));
    }

    match value.as_object() {
        Some(fields) if fields.len() == 1 => Ok(None),
        _ => Ok(Some(value)),
    }
}
