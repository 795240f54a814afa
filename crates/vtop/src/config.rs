/// Client configuration: portal location, retry bounds and timeouts
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Base URL of the VTOP portal.
const VTOP_BASE_URL: &str = "https://vtop.vit.ac.in";

/// Default captcha solving service (a locally hosted solver).
const CAPTCHA_SOLVER_URL: &str = "http://127.0.0.1:5000/solve";

/// Configuration for [`crate::VtopClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VtopConfig {
    /// Portal origin, without the `/vtop` path
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Endpoint that turns a captcha image into text
    #[serde(default = "default_captcha_solver_url")]
    pub captcha_solver_url: String,
    /// Accept the portal's broken certificate chain (portal host only)
    #[serde(default = "default_true")]
    pub accept_invalid_portal_certs: bool,
    /// Captcha rounds per `login()` call
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
    /// Prelogin setup requests per round before giving up on the captcha
    #[serde(default = "default_max_captcha_setup_attempts")]
    pub max_captcha_setup_attempts: u32,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Timeout for portal pages and report requests
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    #[serde(default = "default_captcha_timeout_secs")]
    pub captcha_timeout_secs: u64,
    /// Base pause between captcha rounds (jitter is added on top)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    VTOP_BASE_URL.to_string()
}

fn default_captcha_solver_url() -> String {
    CAPTCHA_SOLVER_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_login_attempts() -> u32 {
    40
}

fn default_max_captcha_setup_attempts() -> u32 {
    20
}

fn default_max_redirects() -> usize {
    10
}

fn default_page_timeout_secs() -> u64 {
    30
}

fn default_captcha_timeout_secs() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    300
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for VtopConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            captcha_solver_url: default_captcha_solver_url(),
            accept_invalid_portal_certs: default_true(),
            max_login_attempts: default_max_login_attempts(),
            max_captcha_setup_attempts: default_max_captcha_setup_attempts(),
            max_redirects: default_max_redirects(),
            page_timeout_secs: default_page_timeout_secs(),
            captcha_timeout_secs: default_captcha_timeout_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl VtopConfig {
    /// Loads a configuration from a JSON file. Missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: VtopConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the URLs parse and the bounds are usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.base_url).context("base_url is not a valid URL")?;
        Url::parse(&self.captcha_solver_url).context("captcha_solver_url is not a valid URL")?;
        anyhow::ensure!(self.max_login_attempts > 0, "max_login_attempts must be at least 1");
        anyhow::ensure!(
            self.max_captcha_setup_attempts > 0,
            "max_captcha_setup_attempts must be at least 1"
        );
        Ok(())
    }

    /// Host that gets the TLS exemption, if the exemption is enabled.
    pub fn portal_host(&self) -> Option<String> {
        if !self.accept_invalid_portal_certs {
            return None;
        }
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn captcha_timeout(&self) -> Duration {
        Duration::from_secs(self.captcha_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: VtopConfig =
            serde_json::from_str(r#"{"max_login_attempts": 5, "retry_delay_ms": 0}"#).unwrap();
        assert_eq!(config.max_login_attempts, 5);
        assert_eq!(config.max_captcha_setup_attempts, 20);
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.retry_delay(), Duration::ZERO);
        assert_eq!(config.base_url, VTOP_BASE_URL);
    }

    #[test]
    fn test_portal_host() {
        let config = VtopConfig::default();
        assert_eq!(config.portal_host().as_deref(), Some("vtop.vit.ac.in"));

        let strict = VtopConfig {
            accept_invalid_portal_certs: false,
            ..VtopConfig::default()
        };
        assert_eq!(strict.portal_host(), None);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = VtopConfig {
            max_login_attempts: 0,
            ..VtopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("vtop-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"base_url": "https://vtop.example.edu", "max_redirects": 4}"#).unwrap();
        let config = VtopConfig::load_from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.max_redirects, 4);
        assert_eq!(config.portal_host().as_deref(), Some("vtop.example.edu"));
        assert!(VtopConfig::load_from_file(Path::new("/nonexistent/vtop.json")).is_err());
    }
}
