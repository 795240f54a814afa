//! Error types for the VTOP client.

use thiserror::Error;

/// Errors that can occur while talking to VTOP.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VtopError {
    /// Network/HTTP request failed (connect, TLS, timeout, body read)
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The redirect chain was longer than the configured bound
    #[error("Too many redirects (limit {limit})")]
    TooManyRedirects { limit: usize },

    /// The landing page loaded but carried no `_csrf` field
    #[error("No CSRF token found on the landing page")]
    CsrfTokenMissing,

    /// The prelogin setup never returned a captcha image
    #[error("No captcha image after {attempts} setup attempts")]
    CaptchaUnavailable { attempts: u32 },

    /// The captcha solver returned nothing usable
    #[error("Captcha solver returned no answer")]
    CaptchaSolveFailure,

    /// The portal rejected the solved captcha text
    #[error("Portal rejected the captcha answer")]
    InvalidCaptcha,

    /// The portal rejected the username/password pair
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The login response matched neither a success nor a known failure
    #[error("Unexpected login response: {excerpt}")]
    UnexpectedLoginResponse { excerpt: String },

    /// Every login attempt in the budget was used up
    #[error("Login failed after {attempts} attempts")]
    LoginRetriesExhausted { attempts: u32 },

    /// An authenticated request came back with the login page
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// A fetch was attempted without an authenticated session
    #[error("Not logged in")]
    NotAuthenticated,

    /// The caller cancelled the login run
    #[error("Login cancelled")]
    Cancelled,

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    Url { message: String },
}

impl VtopError {
    /// Returns true if the caller should log in again before retrying.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, VtopError::SessionExpired | VtopError::NotAuthenticated)
    }

    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VtopError::Transport { .. }
                | VtopError::TooManyRedirects { .. }
                | VtopError::CaptchaSolveFailure
                | VtopError::InvalidCaptcha
        )
    }
}

impl From<reqwest::Error> for VtopError {
    fn from(err: reqwest::Error) -> Self {
        VtopError::Transport {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for VtopError {
    fn from(err: url::ParseError) -> Self {
        VtopError::Url {
            message: err.to_string(),
        }
    }
}

/// An extractor dropped rows that looked like data.
///
/// Never fatal: the records that did parse are still returned.
#[derive(Debug, Error, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[error("{extractor}: {rejected} row(s) could not be parsed")]
pub struct ParseIncomplete {
    pub extractor: String,
    pub rejected: usize,
}
