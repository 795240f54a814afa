//! Login state machine pieces that do not need a network connection.
//!
//! The client drives the actual loop; this module holds the states it moves
//! through, the response classifier, and the small helpers the loop uses.

use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Bytes of an unrecognized login response kept in the error.
const EXCERPT_LEN: usize = 200;

/// Failure texts the portal renders on the login page. Checked before success markers.
const INVALID_CAPTCHA_MARKERS: &[&str] = &["Invalid Captcha"];
const INVALID_CREDENTIAL_MARKERS: &[&str] = &[
    "Invalid Username/Password",
    "Invalid LoginId/Password",
    "Invalid Credentials",
];
/// Text that only appears once the student dashboard has loaded.
const SUCCESS_MARKERS: &[&str] = &["authorizedID", "Academics", "Time Table"];

/// Where a login run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    LoadingInitialPage,
    AwaitingCaptcha,
    SolvingCaptcha,
    SubmittingCredentials,
    Authenticated,
    Failed,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginState::Idle => "idle",
            LoginState::LoadingInitialPage => "loading_initial_page",
            LoginState::AwaitingCaptcha => "awaiting_captcha",
            LoginState::SolvingCaptcha => "solving_captcha",
            LoginState::SubmittingCredentials => "submitting_credentials",
            LoginState::Authenticated => "authenticated",
            LoginState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One captcha round's worth of prelogin output.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub page_html: String,
    pub captcha_image_data_uri: String,
    /// Submit target from the login form, relative or absolute
    pub form_action_url: Option<String>,
}

/// What a login submission response says happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginVerdict {
    Authenticated,
    InvalidCaptcha,
    InvalidCredentials,
    Unrecognized,
}

/// Classifies the body returned by the credential submission.
///
/// All knowledge of the portal's login wording lives here.
pub fn classify_login_response(body: &str) -> LoginVerdict {
    let lower = body.to_ascii_lowercase();
    let contains_any =
        |markers: &[&str]| markers.iter().any(|m| lower.contains(&m.to_ascii_lowercase()));

    if contains_any(INVALID_CAPTCHA_MARKERS) {
        LoginVerdict::InvalidCaptcha
    } else if contains_any(INVALID_CREDENTIAL_MARKERS) {
        LoginVerdict::InvalidCredentials
    } else if SUCCESS_MARKERS.iter().any(|m| body.contains(m)) {
        LoginVerdict::Authenticated
    } else {
        LoginVerdict::Unrecognized
    }
}

/// First few hundred characters of a page, whitespace collapsed, for error messages.
pub fn response_excerpt(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}

/// Generates a short id that ties together the log lines of one login run.
pub fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}

/// Pause between captcha rounds: the base delay plus up to 20% jitter.
pub fn retry_delay(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let jitter = rand::thread_rng().gen_range(0..=(base_ms / 5));
    Duration::from_millis(base_ms + jitter)
}
