//! Captcha solving.
//!
//! The portal's captcha is an inline `data:image/...;base64,` bitmap. Solving
//! is delegated to an external service; any failure there just means the
//! login loop asks the portal for a fresh captcha.

use crate::config::VtopConfig;
use crate::error::VtopError;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Something that can turn a captcha image into its text.
pub trait CaptchaSolver {
    /// Returns the predicted captcha text, or `None` if no answer is available.
    fn solve(&self, image_data_uri: &str) -> impl Future<Output = Option<String>> + Send;
}

#[derive(Debug, Serialize)]
struct SolveRequest {
    imgstring: String,
}

/// Encodes the full data URI, prefix included, as URL-safe base64.
pub fn encode_captcha_payload(image_data_uri: &str) -> String {
    URL_SAFE.encode(image_data_uri.as_bytes())
}

/// Solver backed by an HTTP service that answers with the plain captcha text.
#[derive(Debug, Clone)]
pub struct HttpCaptchaSolver {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpCaptchaSolver {
    pub fn new(config: &VtopConfig) -> Result<Self, VtopError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.captcha_timeout())
            .build()
            .map_err(|e| VtopError::Transport {
                message: format!("Failed to build captcha client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.captcha_solver_url.clone(),
            timeout: config.captcha_timeout(),
        })
    }
}

impl CaptchaSolver for HttpCaptchaSolver {
    async fn solve(&self, image_data_uri: &str) -> Option<String> {
        let payload = SolveRequest {
            imgstring: encode_captcha_payload(image_data_uri),
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Captcha solver request failed");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            warn!(status = %response.status(), "Captcha solver returned an error status");
            return None;
        }

        match response.text().await {
            Ok(text) => {
                let answer = text.trim();
                if answer.is_empty() {
                    warn!("Captcha solver returned an empty answer");
                    None
                } else {
                    debug!(length = answer.len(), "Captcha solved");
                    Some(answer.to_string())
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read captcha solver response");
                None
            }
        }
    }
}
