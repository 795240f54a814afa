//! Redirect-aware HTTP executor.
//!
//! Redirects are followed by hand (the reqwest clients use `Policy::none()`)
//! so that every hop's `Set-Cookie` headers land in one running cookie jar.

mod cookies;

pub use cookies::CookieJar;

use crate::config::VtopConfig;
use crate::error::VtopError;
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Request payload. Kept as data so it can be rebuilt for each hop.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `multipart/form-data` with text fields only
    Multipart(Vec<(String, String)>),
}

impl RequestBody {
    /// Builds a form body from borrowed pairs.
    pub fn form(pairs: &[(&str, &str)]) -> Self {
        RequestBody::Form(owned_pairs(pairs))
    }

    /// Builds a multipart body from borrowed pairs.
    pub fn multipart(pairs: &[(&str, &str)]) -> Self {
        RequestBody::Multipart(owned_pairs(pairs))
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A single logical request (which may turn into several hops).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
    pub cookie_header: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: RequestBody::Empty,
            cookie_header: None,
            timeout: None,
        }
    }

    pub fn post(url: Url, body: RequestBody) -> Self {
        Self {
            method: Method::POST,
            url,
            body,
            cookie_header: None,
            timeout: None,
        }
    }

    pub fn cookies(mut self, cookie_header: Option<&str>) -> Self {
        self.cookie_header = cookie_header.map(str::to_string);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of a request after all redirects were followed.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
    /// Incoming cookie header merged with every `Set-Cookie` seen on the way
    pub cookie_header: Option<String>,
    pub final_url: Url,
}

/// HTTP executor shared by the login flow and the report fetchers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Verifies certificates as usual
    strict: Client,
    /// Accepts invalid certificates; only ever used for `insecure_host`
    lenient: Client,
    insecure_host: Option<String>,
    max_redirects: usize,
}

impl HttpTransport {
    /// Creates a transport from the client configuration.
    pub fn new(config: &VtopConfig) -> Result<Self, VtopError> {
        let strict = base_builder(config)
            .build()
            .map_err(|e| VtopError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let lenient = base_builder(config)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| VtopError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            strict,
            lenient,
            insecure_host: config.portal_host(),
            max_redirects: config.max_redirects,
        })
    }

    /// Returns true if requests to `url` skip certificate verification.
    pub fn accepts_invalid_certs_for(&self, url: &Url) -> bool {
        match (&self.insecure_host, url.host_str()) {
            (Some(allowed), Some(host)) => allowed.eq_ignore_ascii_case(host),
            _ => false,
        }
    }

    fn client_for(&self, url: &Url) -> &Client {
        if self.accepts_invalid_certs_for(url) {
            &self.lenient
        } else {
            &self.strict
        }
    }

    /// Executes a request, following redirects and accumulating cookies.
    ///
    /// Non-2xx final statuses are returned as-is; only network failures,
    /// timeouts and an overlong redirect chain are errors.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, VtopError> {
        let mut jar = request
            .cookie_header
            .as_deref()
            .map(CookieJar::from_header)
            .unwrap_or_default();
        let mut method = request.method;
        let mut body = request.body;
        let mut url = request.url;
        let mut redirects = 0usize;

        loop {
            debug!(method = %method, url = %url, hop = redirects, "Sending request");

            let mut builder = self.client_for(&url).request(method.clone(), url.clone());
            if let Some(cookie) = jar.to_header() {
                builder = builder.header(COOKIE, cookie);
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }
            builder = match &body {
                RequestBody::Empty => builder,
                RequestBody::Form(pairs) => builder.form(pairs),
                RequestBody::Multipart(pairs) => {
                    let form = pairs
                        .iter()
                        .fold(reqwest::multipart::Form::new(), |form, (k, v)| {
                            form.text(k.clone(), v.clone())
                        });
                    builder.multipart(form)
                }
            };

            let response = builder.send().await?;
            let status = response.status();

            for value in response.headers().get_all(SET_COOKIE).iter() {
                match value.to_str() {
                    Ok(set_cookie) => jar.apply_set_cookie(set_cookie),
                    Err(_) => warn!(url = %url, "Ignoring non-ASCII Set-Cookie header"),
                }
            }

            let location = if status.is_redirection() {
                response
                    .headers()
                    .get(LOCATION)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_string)
            } else {
                None
            };

            let Some(location) = location else {
                let final_url = response.url().clone();
                let text = response.text().await?;
                debug!(status = %status, url = %final_url, bytes = text.len(), "Request complete");
                return Ok(HttpResponse {
                    status,
                    body: text,
                    cookie_header: jar.to_header(),
                    final_url,
                });
            };

            redirects += 1;
            if redirects > self.max_redirects {
                warn!(url = %url, limit = self.max_redirects, "Redirect limit exceeded");
                return Err(VtopError::TooManyRedirects {
                    limit: self.max_redirects,
                });
            }

            let next = url.join(&location)?;
            debug!(status = %status, from = %url, to = %next, "Following redirect");

            if method == Method::POST && switches_to_get(status) {
                method = Method::GET;
                body = RequestBody::Empty;
            }
            url = next;
        }
    }
}

/// 301/302/303 after a POST are replayed as GET; 307/308 keep the method.
fn switches_to_get(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
    )
}

fn base_builder(config: &VtopConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .redirect(Policy::none())
        .user_agent(&config.user_agent)
        .connect_timeout(Duration::from_secs(10))
        .timeout(config.page_timeout())
}
