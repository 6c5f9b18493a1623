//! Environment-driven configuration for the console core. Values are public
//! except the API key, which stays wrapped in `SecretString` so it never shows
//! up in debug output or logs.

use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_STATE_DIR: &str = ".tds-console";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the hosted authentication + document-store service.
    pub api_base_url: String,
    pub api_key: SecretString,
    /// Directory holding client-durable state (the remembered-login hint).
    pub state_dir: PathBuf,
    /// Applied to every backend request; a hung call surfaces as an error
    /// instead of leaving the session loading forever.
    pub request_timeout: Duration,
}

impl ConsoleConfig {
    pub fn new(api_base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_key,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Loads configuration from `TDS_*` environment variables.
    ///
    /// `TDS_API_BASE_URL` and `TDS_API_KEY` are required; `TDS_STATE_DIR` and
    /// `TDS_REQUEST_TIMEOUT_SECS` fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let api_base_url =
            env::var("TDS_API_BASE_URL").context("missing required TDS_API_BASE_URL")?;
        validate_base_url(&api_base_url)?;

        let api_key = env::var("TDS_API_KEY")
            .context("missing required TDS_API_KEY")?
            .into();

        let state_dir = env::var("TDS_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_DIR));

        let request_timeout = match env::var("TDS_REQUEST_TIMEOUT_SECS") {
            Ok(secs) => Duration::from_secs(
                secs.parse::<u64>()
                    .context("TDS_REQUEST_TIMEOUT_SECS must be an integer number of seconds")?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            api_base_url,
            api_key,
            state_dir,
            request_timeout,
        })
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let url = Url::parse(base_url)?;

    url.host()
        .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(anyhow!("Error parsing URL: unsupported scheme {}", scheme)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn from_env_reads_required_and_optional_vars() {
        temp_env::with_vars(
            [
                ("TDS_API_BASE_URL", Some("https://api.tds-console.dev")),
                ("TDS_API_KEY", Some("k-123")),
                ("TDS_STATE_DIR", Some("/tmp/tds-state")),
                ("TDS_REQUEST_TIMEOUT_SECS", Some("3")),
            ],
            || {
                let config = ConsoleConfig::from_env().expect("config should load");
                assert_eq!(config.api_base_url, "https://api.tds-console.dev");
                assert_eq!(config.api_key.expose_secret(), "k-123");
                assert_eq!(config.state_dir, PathBuf::from("/tmp/tds-state"));
                assert_eq!(config.request_timeout, Duration::from_secs(3));
            },
        );
    }

    #[test]
    fn from_env_applies_defaults() {
        temp_env::with_vars(
            [
                ("TDS_API_BASE_URL", Some("http://localhost:8080")),
                ("TDS_API_KEY", Some("k")),
                ("TDS_STATE_DIR", None),
                ("TDS_REQUEST_TIMEOUT_SECS", None),
            ],
            || {
                let config = ConsoleConfig::from_env().expect("config should load");
                assert_eq!(config.state_dir, PathBuf::from(DEFAULT_STATE_DIR));
                assert_eq!(
                    config.request_timeout,
                    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
                );
            },
        );
    }

    #[test]
    fn from_env_rejects_missing_base_url() {
        temp_env::with_vars(
            [
                ("TDS_API_BASE_URL", None::<&str>),
                ("TDS_API_KEY", Some("k")),
            ],
            || {
                assert!(ConsoleConfig::from_env().is_err());
            },
        );
    }

    #[test]
    fn from_env_rejects_unsupported_scheme() {
        temp_env::with_vars(
            [
                ("TDS_API_BASE_URL", Some("ftp://api.tds-console.dev")),
                ("TDS_API_KEY", Some("k")),
            ],
            || {
                assert!(ConsoleConfig::from_env().is_err());
            },
        );
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        let config =
            ConsoleConfig::new("https://api.tds-console.dev", "super-secret".to_string().into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
    }
}
