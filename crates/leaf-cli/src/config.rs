//! Configuration file handling for leaf-cli

use anyhow::{Context, Result};
use leaf_client::{LeafConfig, Region, DEFAULT_APP_STRINGS, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file contents. Every field can be overridden from the
/// command line or the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Account user name or email address
    pub username: Option<String>,
    /// Account password
    pub password: Option<String>,
    /// Region code (NE, NNA, NCI, NMA, NML)
    pub region: Option<String>,
    /// Gateway base URL
    pub base_url: Option<String>,
    /// Client application string
    pub app_strings: Option<String>,
    /// Default time budget in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub region: Option<&'a str>,
    pub base_url: Option<&'a str>,
    pub timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("leaf-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge overrides over config file values
    pub fn merge_with_args(&self, args: &Overrides<'_>) -> Result<MergedConfig> {
        let username = args
            .username
            .map(String::from)
            .or_else(|| self.username.clone())
            .context("No username configured (use --username or LEAF_USERNAME)")?;
        let password = args
            .password
            .map(String::from)
            .or_else(|| self.password.clone())
            .context("No password configured (use --password or LEAF_PASSWORD)")?;

        let region = match args.region.or(self.region.as_deref()) {
            Some(code) => code.parse::<Region>()?,
            None => Region::default(),
        };

        let account = LeafConfig {
            username,
            password,
            region,
            app_strings: self
                .app_strings
                .clone()
                .unwrap_or_else(|| DEFAULT_APP_STRINGS.to_string()),
            base_url: args
                .base_url
                .map(String::from)
                .or_else(|| self.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };
        account.validate()?;

        Ok(MergedConfig {
            account,
            timeout_ms: args.timeout_ms.or(self.timeout_ms),
        })
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub account: LeafConfig,
    pub timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
username = "me@example.com"
password = "pw"
region = "NNA"
timeout_ms = 7000
"#,
        );
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.username.as_deref(), Some("me@example.com"));
        assert_eq!(config.region.as_deref(), Some("NNA"));
        assert_eq!(config.timeout_ms, Some(7000));

        let merged = config.merge_with_args(&Overrides::default()).unwrap();
        assert_eq!(merged.account.region, Region::NorthAmerica);
        assert_eq!(merged.account.base_url, DEFAULT_BASE_URL);
        assert_eq!(merged.timeout_ms, Some(7000));
    }

    #[test]
    fn test_invalid_file() {
        let file = write_config("username = [");
        assert!(Config::load_from(file.path()).is_err());
        assert!(Config::load_from(Path::new("/nonexistent/leaf.toml")).is_err());
    }

    #[test]
    fn test_args_override_file() {
        let config = Config {
            username: Some("file-user".into()),
            password: Some("file-pw".into()),
            region: Some("NE".into()),
            timeout_ms: Some(1000),
            ..Default::default()
        };
        let merged = config
            .merge_with_args(&Overrides {
                username: Some("arg-user"),
                region: Some("nci"),
                base_url: Some("http://127.0.0.1:8080/gdc/"),
                timeout_ms: Some(2500),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(merged.account.username, "arg-user");
        assert_eq!(merged.account.password, "file-pw");
        assert_eq!(merged.account.region, Region::Canada);
        assert_eq!(merged.account.base_url, "http://127.0.0.1:8080/gdc/");
        assert_eq!(merged.timeout_ms, Some(2500));
    }

    #[test]
    fn test_missing_credentials() {
        let err = Config::default()
            .merge_with_args(&Overrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("username"));

        let err = Config::default()
            .merge_with_args(&Overrides {
                username: Some("u"),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_bad_region() {
        let config = Config {
            username: Some("u".into()),
            password: Some("p".into()),
            region: Some("XX".into()),
            ..Default::default()
        };
        assert!(config.merge_with_args(&Overrides::default()).is_err());
    }
}
