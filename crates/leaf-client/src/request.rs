//! Form-encoded upstream requests

/// One call to the gateway: an endpoint and its ordered form parameters.
///
/// Values are stored already escaped, so the body is rendered by plain
/// concatenation in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    endpoint: String,
    parameters: Vec<(String, String)>,
}

impl CommandRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter, percent-escaping the value
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.parameters
            .push((name.to_string(), urlencoding::encode(value).into_owned()));
        self
    }

    /// Add a parameter whose value is already escaped
    pub fn encoded_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parameters.push((name.to_string(), value.into()));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// Look up a parameter value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Render the `application/x-www-form-urlencoded` body
    pub fn form_body(&self) -> String {
        self.parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}
