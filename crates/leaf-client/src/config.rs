//! Account configuration consumed by the client

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LeafClientError, Result};

/// Production gateway. Every endpoint is a path segment below this URL.
pub const DEFAULT_BASE_URL: &str = "https://gdcportalgw.its-mo.com/gworchest_160803EC/gdc/";

/// Static application string the gateway expects from every client
pub const DEFAULT_APP_STRINGS: &str = "geORNtsZe5I4lRGjG9GZiA";

/// Upstream account region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Region {
    /// Europe
    #[default]
    #[serde(rename = "NE")]
    Europe,
    /// North America (United States)
    #[serde(rename = "NNA")]
    NorthAmerica,
    /// Canada
    #[serde(rename = "NCI")]
    Canada,
    /// Australia
    #[serde(rename = "NMA")]
    Australia,
    /// Japan
    #[serde(rename = "NML")]
    Japan,
}

impl Region {
    /// The `RegionCode` value sent upstream
    pub fn code(&self) -> &'static str {
        match self {
            Region::Europe => "NE",
            Region::NorthAmerica => "NNA",
            Region::Canada => "NCI",
            Region::Australia => "NMA",
            Region::Japan => "NML",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = LeafClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NE" => Ok(Region::Europe),
            "NNA" => Ok(Region::NorthAmerica),
            "NCI" => Ok(Region::Canada),
            "NMA" => Ok(Region::Australia),
            "NML" => Ok(Region::Japan),
            other => Err(LeafClientError::Config(format!(
                "Unknown region code '{}' (expected NE, NNA, NCI, NMA or NML)",
                other
            ))),
        }
    }
}

/// Account configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct LeafConfig {
    /// Account user name or email address
    pub username: String,
    /// Account password (plaintext; encrypted per session before sending)
    pub password: String,
    /// Account region
    #[serde(default)]
    pub region: Region,
    /// Client application string
    #[serde(default = "default_app_strings")]
    pub app_strings: String,
    /// Gateway base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_app_strings() -> String {
    DEFAULT_APP_STRINGS.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl LeafConfig {
    /// Create a configuration for the production gateway
    pub fn new(username: impl Into<String>, password: impl Into<String>, region: Region) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            region,
            app_strings: default_app_strings(),
            base_url: default_base_url(),
        }
    }

    /// Point the client at a different gateway (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parse and normalise the base URL.
    ///
    /// Endpoints are joined as relative segments, so the path must end in `/`.
    pub fn parsed_base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Reject configurations that can never log in
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(LeafClientError::Config("username is empty".into()));
        }
        if self.password.is_empty() {
            return Err(LeafClientError::Config("password is empty".into()));
        }
        if self.app_strings.is_empty() {
            return Err(LeafClientError::Config("app_strings is empty".into()));
        }
        self.parsed_base_url()?;
        Ok(())
    }
}

impl fmt::Debug for LeafConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("region", &self.region)
            .field("app_strings", &self.app_strings)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parse() {
        assert_eq!("ne".parse::<Region>().unwrap(), Region::Europe);
        assert_eq!(" NNA ".parse::<Region>().unwrap(), Region::NorthAmerica);
        assert!("XX".parse::<Region>().is_err());
    }

    #[test]
    fn test_region_serde_uses_codes() {
        let json = serde_json::to_string(&Region::Canada).unwrap();
        assert_eq!(json, "\"NCI\"");
        let parsed: Region = serde_json::from_str("\"NMA\"").unwrap();
        assert_eq!(parsed, Region::Australia);
    }

    #[test]
    fn test_defaults_from_minimal_document() {
        let config: LeafConfig =
            serde_json::from_str(r#"{"username":"me@example.com","password":"pw"}"#).unwrap();
        assert_eq!(config.region, Region::Europe);
        assert_eq!(config.app_strings, DEFAULT_APP_STRINGS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = LeafConfig::new("user", "hunter2", Region::Europe);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = LeafConfig::new("u", "p", Region::Europe).with_base_url("http://127.0.0.1:1/gdc");
        assert_eq!(
            config.parsed_base_url().unwrap().as_str(),
            "http://127.0.0.1:1/gdc/"
        );
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(LeafConfig::new("", "p", Region::Europe).validate().is_err());
        assert!(LeafConfig::new("u", "", Region::Europe).validate().is_err());
        let bad_url = LeafConfig::new("u", "p", Region::Europe).with_base_url("not a url");
        assert!(bad_url.validate().is_err());
    }
}
