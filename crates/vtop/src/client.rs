//! VTOP client: the login loop and the report fetchers.
//!
//! Login flow:
//! 1. GET the landing page for a `_csrf` token
//! 2. POST prelogin setup until the response embeds a captcha image
//! 3. Solve the captcha and POST the credentials
//! 4. Classify the response; retry on a rejected captcha, stop on anything fatal
//!
//! Fetchers require an authenticated session and never log in on their own;
//! see [`VtopClient::ensure_session`] for the caller-side policy.

use crate::captcha::{CaptchaSolver, HttpCaptchaSolver};
use crate::config::VtopConfig;
use crate::error::VtopError;
use crate::login::{
    classify_login_response, generate_correlation_id, response_excerpt, retry_delay, LoginAttempt,
    LoginState, LoginVerdict,
};
use crate::parser::{self, login_page, Extraction};
use crate::session::{CancelHandle, SavedSession, SessionKey, SessionState, SessionStore};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, RequestBody};
use crate::types::{
    AttendanceCourse, AttendanceDetail, CourseMarks, ExamTypeGroup, Fetched, Semester,
    TimetableSlot,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

/// Portal paths, relative to the configured base URL.
pub mod paths {
    pub const LANDING: &str = "/vtop/open/page";
    pub const PRELOGIN_SETUP: &str = "/vtop/prelogin/setup";
    /// Used when the prelogin page carries no form action
    pub const LOGIN: &str = "/vtop/login";
    pub const LOGOUT: &str = "/vtop/logout";
    pub const SEMESTERS: &str = "/vtop/academics/common/StudentTimeTable";
    pub const TIMETABLE: &str = "/vtop/processViewTimeTable";
    pub const ATTENDANCE: &str = "/vtop/processViewStudentAttendance";
    pub const ATTENDANCE_DETAIL: &str = "/vtop/processViewAttendanceDetail";
    pub const MARKS: &str = "/vtop/examinations/doStudentMarkView";
    pub const EXAM_SCHEDULE: &str = "/vtop/examinations/doSearchExamScheduleForStudent";
}

/// A client behind an async mutex, for callers that share one session across tasks.
pub type SharedVtopClient<S = HttpCaptchaSolver> = Arc<Mutex<VtopClient<S>>>;

/// Body encoding a report endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportEncoding {
    Form,
    Multipart,
}

/// Returns true if a report response is really the login page.
pub fn looks_like_login_page(body: &str) -> bool {
    body.contains("login")
}

/// Client for one VTOP session.
pub struct VtopClient<S: CaptchaSolver = HttpCaptchaSolver> {
    config: VtopConfig,
    base_url: Url,
    transport: HttpTransport,
    solver: S,
    session: SessionState,
    state: LoginState,
}

impl VtopClient<HttpCaptchaSolver> {
    /// Creates a client that solves captchas through the configured HTTP service.
    pub fn new(config: VtopConfig) -> Result<Self, VtopError> {
        let solver = HttpCaptchaSolver::new(&config)?;
        Self::with_solver(config, solver)
    }
}

impl<S: CaptchaSolver> VtopClient<S> {
    /// Creates a client with a custom captcha solver.
    pub fn with_solver(config: VtopConfig, solver: S) -> Result<Self, VtopError> {
        let base_url = Url::parse(&config.base_url)?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            config,
            base_url,
            transport,
            solver,
            session: SessionState::new(),
            state: LoginState::Idle,
        })
    }

    /// Wraps the client for shared use across tasks.
    pub fn shared(self) -> SharedVtopClient<S> {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &VtopConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn login_state(&self) -> LoginState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.authenticated
    }

    fn url(&self, path: &str) -> Result<Url, VtopError> {
        Ok(self.base_url.join(path)?)
    }

    fn transition(&mut self, next: LoginState, correlation_id: &str) {
        debug!(
            correlation_id = %correlation_id,
            from = %self.state,
            to = %next,
            "Login state transition"
        );
        self.state = next;
    }

    /// Sends a request with the session cookies and folds the returned cookies back in.
    async fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, VtopError> {
        let request = request
            .cookies(self.session.cookie_header.as_deref())
            .timeout(self.config.page_timeout());
        let response = self.transport.execute(request).await?;
        self.session.merge_cookies(response.cookie_header.clone());
        Ok(response)
    }

    fn refresh_csrf(&mut self, html: &str) {
        if let Some(token) = login_page::csrf_token(html) {
            self.session.csrf_token = Some(token);
        }
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Logs in, retrying captcha rounds up to `max_login_attempts`.
    ///
    /// Returns the session triple for the caller to persist.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<SavedSession, VtopError> {
        self.login_with_cancel(username, password, &CancelHandle::new())
            .await
    }

    /// Like [`login`](Self::login), but stops between captcha rounds once `cancel` fires.
    pub async fn login_with_cancel(
        &mut self,
        username: &str,
        password: &str,
        cancel: &CancelHandle,
    ) -> Result<SavedSession, VtopError> {
        let correlation_id = generate_correlation_id();
        info!(
            correlation_id = %correlation_id,
            user = %SessionKey::from_username(username),
            max_attempts = self.config.max_login_attempts,
            "Starting VTOP login"
        );

        self.session.reset();
        self.state = LoginState::Idle;

        let start = Instant::now();
        let result = self
            .run_login(username, password, cancel, &correlation_id)
            .await;

        match &result {
            Ok(saved) => {
                self.transition(LoginState::Authenticated, &correlation_id);
                info!(
                    correlation_id = %correlation_id,
                    subject = %saved.subject_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "VTOP login succeeded"
                );
            }
            Err(e) => {
                self.session.authenticated = false;
                self.transition(LoginState::Failed, &correlation_id);
                error!(
                    correlation_id = %correlation_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "VTOP login failed"
                );
            }
        }

        result
    }

    async fn run_login(
        &mut self,
        username: &str,
        password: &str,
        cancel: &CancelHandle,
        correlation_id: &str,
    ) -> Result<SavedSession, VtopError> {
        let max_attempts = self.config.max_login_attempts;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = retry_delay(self.config.retry_delay());
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            // Checked after the backoff so a cancel during the sleep skips the round
            if cancel.is_cancelled() {
                warn!(correlation_id = %correlation_id, attempt, "Login cancelled");
                return Err(VtopError::Cancelled);
            }

            match self
                .login_attempt(username, password, attempt, correlation_id)
                .await
            {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_retryable() => {
                    warn!(
                        correlation_id = %correlation_id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Login attempt failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(VtopError::LoginRetriesExhausted {
            attempts: max_attempts,
        })
    }

    /// One captcha round: (landing page), prelogin, solve, submit, classify.
    async fn login_attempt(
        &mut self,
        username: &str,
        password: &str,
        attempt: u32,
        correlation_id: &str,
    ) -> Result<SavedSession, VtopError> {
        if self.session.csrf_token.is_none() {
            self.transition(LoginState::LoadingInitialPage, correlation_id);
            let landing = self.send(HttpRequest::get(self.url(paths::LANDING)?)).await?;
            let token = login_page::csrf_token(&landing.body).ok_or_else(|| {
                warn!(
                    correlation_id = %correlation_id,
                    status = %landing.status,
                    "Landing page has no CSRF token"
                );
                VtopError::CsrfTokenMissing
            })?;
            self.session.csrf_token = Some(token);
        }

        self.transition(LoginState::AwaitingCaptcha, correlation_id);
        let prelogin = self.load_captcha(correlation_id).await?;

        self.transition(LoginState::SolvingCaptcha, correlation_id);
        let Some(answer) = self.solver.solve(&prelogin.captcha_image_data_uri).await else {
            return Err(VtopError::CaptchaSolveFailure);
        };

        self.transition(LoginState::SubmittingCredentials, correlation_id);
        let action = prelogin
            .form_action_url
            .as_deref()
            .unwrap_or(paths::LOGIN);
        let url = self.url(action)?;
        let csrf = self.session.csrf_token.clone().unwrap_or_default();
        let body = RequestBody::form(&[
            ("_csrf", csrf.as_str()),
            ("username", username),
            ("password", password),
            ("captchaStr", answer.as_str()),
        ]);

        info!(
            correlation_id = %correlation_id,
            attempt,
            url = %url,
            "Submitting credentials"
        );
        let response = self.send(HttpRequest::post(url, body)).await?;
        self.refresh_csrf(&response.body);

        match classify_login_response(&response.body) {
            LoginVerdict::Authenticated => {
                let subject_id = login_page::authorized_id(&response.body)
                    .unwrap_or_else(|| username.trim().to_string());
                self.session.subject_id = Some(subject_id);
                self.session.authenticated = true;
                self.session
                    .to_saved()
                    .ok_or_else(|| VtopError::UnexpectedLoginResponse {
                        excerpt: response_excerpt(&response.body),
                    })
            }
            LoginVerdict::InvalidCaptcha => Err(VtopError::InvalidCaptcha),
            LoginVerdict::InvalidCredentials => Err(VtopError::InvalidCredentials),
            LoginVerdict::Unrecognized => Err(VtopError::UnexpectedLoginResponse {
                excerpt: response_excerpt(&response.body),
            }),
        }
    }

    /// POSTs prelogin setup until a captcha image shows up.
    async fn load_captcha(&mut self, correlation_id: &str) -> Result<LoginAttempt, VtopError> {
        let max_setup = self.config.max_captcha_setup_attempts;
        let url = self.url(paths::PRELOGIN_SETUP)?;

        for setup_attempt in 1..=max_setup {
            let csrf = self.session.csrf_token.clone().unwrap_or_default();
            let body = RequestBody::form(&[("_csrf", csrf.as_str()), ("flag", "VTOP")]);
            let response = self.send(HttpRequest::post(url.clone(), body)).await?;
            self.refresh_csrf(&response.body);

            if let Some(captcha) = login_page::captcha_data_uri(&response.body) {
                debug!(
                    correlation_id = %correlation_id,
                    setup_attempt,
                    "Captcha image found"
                );
                return Ok(LoginAttempt {
                    form_action_url: login_page::login_form_action(&response.body),
                    captcha_image_data_uri: captcha,
                    page_html: response.body,
                });
            }

            debug!(
                correlation_id = %correlation_id,
                setup_attempt,
                status = %response.status,
                "No captcha in prelogin response"
            );
        }

        Err(VtopError::CaptchaUnavailable {
            attempts: max_setup,
        })
    }

    /// Ends the session on the portal (best effort) and clears local state.
    pub async fn logout(&mut self) {
        if self.session.authenticated {
            let csrf = self.session.csrf_token.clone().unwrap_or_default();
            let request = self
                .url(paths::LOGOUT)
                .map(|url| HttpRequest::post(url, RequestBody::form(&[("_csrf", csrf.as_str())])));
            match request {
                Ok(request) => {
                    if let Err(e) = self.send(request).await {
                        debug!(error = %e, "Logout request failed, clearing session anyway");
                    }
                }
                Err(e) => debug!(error = %e, "Could not build logout URL"),
            }
        }
        self.session.reset();
        self.state = LoginState::Idle;
        info!("Logged out");
    }

    /// Adopts a previously saved session without logging in.
    ///
    /// The portal may have expired it already; the first fetch will tell.
    pub fn restore_session(&mut self, saved: SavedSession) {
        debug!(subject = %saved.subject_id, "Restoring saved session");
        self.session = SessionState::from_saved(saved);
        self.state = LoginState::Authenticated;
    }

    /// The current session triple, if authenticated.
    pub fn saved_session(&self) -> Option<SavedSession> {
        self.session.to_saved()
    }

    /// Makes sure the client holds a session: the current one, a stored one, or a fresh login.
    ///
    /// A fresh login is saved to `store`. If a fetch later fails with
    /// [`VtopError::SessionExpired`], invalidate the stored entry and call this again.
    pub async fn ensure_session<St>(
        &mut self,
        store: &St,
        username: &str,
        password: &str,
    ) -> Result<SavedSession, VtopError>
    where
        St: SessionStore + ?Sized,
    {
        if let Some(saved) = self.saved_session() {
            return Ok(saved);
        }

        if let Some(saved) = store.load(username) {
            info!(user = %SessionKey::from_username(username), "Using stored session");
            self.restore_session(saved.clone());
            return Ok(saved);
        }

        let saved = self.login(username, password).await?;
        store.save(username, saved.clone());
        Ok(saved)
    }

    // ========================================================================
    // Report fetchers
    // ========================================================================

    /// POSTs one report request with the session fields and returns the page.
    async fn post_report(
        &mut self,
        report: &'static str,
        path: &str,
        encoding: ReportEncoding,
        semester_id: Option<&str>,
        extra: &[(&str, &str)],
    ) -> Result<String, VtopError> {
        if !self.session.authenticated {
            return Err(VtopError::NotAuthenticated);
        }

        let snapshot = self.session.snapshot();
        // The portal's own pages send the current date as `x` to defeat caching
        let cache_buster = Utc::now().to_rfc2822();

        let mut fields: Vec<(&str, &str)> = vec![
            ("_csrf", snapshot.csrf_token.as_str()),
            ("authorizedID", snapshot.subject_id.as_str()),
        ];
        if let Some(semester_id) = semester_id {
            fields.push(("semesterSubId", semester_id));
        }
        fields.extend_from_slice(extra);
        fields.push(("x", cache_buster.as_str()));

        let body = match encoding {
            ReportEncoding::Form => RequestBody::form(&fields),
            ReportEncoding::Multipart => RequestBody::multipart(&fields),
        };
        let url = self.url(path)?;
        debug!(report, url = %url, semester = ?semester_id, "Fetching report");

        let request = HttpRequest::post(url, body)
            .cookies(snapshot.cookie_header.as_deref())
            .timeout(self.config.page_timeout());
        let response = self.transport.execute(request).await?;
        self.session.merge_cookies(response.cookie_header);

        if looks_like_login_page(&response.body) {
            warn!(report, "Report request returned the login page, session expired");
            self.session.authenticated = false;
            self.state = LoginState::Idle;
            return Err(VtopError::SessionExpired);
        }
        if !response.status.is_success() {
            warn!(report, status = %response.status, "Report request returned an error status");
        }

        Ok(response.body)
    }

    /// Semesters offered in the timetable semester picker.
    pub async fn fetch_semesters(&mut self) -> Result<Fetched<Vec<Semester>>, VtopError> {
        let html = self
            .post_report(
                "semesters",
                paths::SEMESTERS,
                ReportEncoding::Form,
                None,
                &[("verifyMenu", "true")],
            )
            .await?;
        Ok(finish("semesters", None, parser::parse_semesters(&html)))
    }

    pub async fn fetch_timetable(
        &mut self,
        semester_id: &str,
    ) -> Result<Fetched<Vec<TimetableSlot>>, VtopError> {
        let html = self
            .post_report(
                "timetable",
                paths::TIMETABLE,
                ReportEncoding::Form,
                Some(semester_id),
                &[],
            )
            .await?;
        Ok(finish("timetable", Some(semester_id), parser::parse_timetable(&html)))
    }

    pub async fn fetch_attendance(
        &mut self,
        semester_id: &str,
    ) -> Result<Fetched<Vec<AttendanceCourse>>, VtopError> {
        let html = self
            .post_report(
                "attendance",
                paths::ATTENDANCE,
                ReportEncoding::Form,
                Some(semester_id),
                &[],
            )
            .await?;
        Ok(finish("attendance", Some(semester_id), parser::parse_attendance(&html)))
    }

    /// Class-by-class attendance for one course.
    ///
    /// `course_id` and `course_type` come from [`AttendanceCourse`].
    pub async fn fetch_attendance_detail(
        &mut self,
        semester_id: &str,
        course_id: &str,
        course_type: &str,
    ) -> Result<Fetched<Vec<AttendanceDetail>>, VtopError> {
        let html = self
            .post_report(
                "attendance_detail",
                paths::ATTENDANCE_DETAIL,
                ReportEncoding::Form,
                Some(semester_id),
                &[("courseId", course_id), ("courseType", course_type)],
            )
            .await?;
        Ok(finish(
            "attendance_detail",
            Some(semester_id),
            parser::parse_attendance_detail(&html),
        ))
    }

    pub async fn fetch_marks(
        &mut self,
        semester_id: &str,
    ) -> Result<Fetched<Vec<CourseMarks>>, VtopError> {
        let html = self
            .post_report(
                "marks",
                paths::MARKS,
                ReportEncoding::Multipart,
                Some(semester_id),
                &[],
            )
            .await?;
        Ok(finish("marks", Some(semester_id), parser::parse_marks(&html)))
    }

    pub async fn fetch_exam_schedule(
        &mut self,
        semester_id: &str,
    ) -> Result<Fetched<Vec<ExamTypeGroup>>, VtopError> {
        let html = self
            .post_report(
                "exam_schedule",
                paths::EXAM_SCHEDULE,
                ReportEncoding::Multipart,
                Some(semester_id),
                &[],
            )
            .await?;
        Ok(finish(
            "exam_schedule",
            Some(semester_id),
            parser::parse_exam_schedule(&html),
        ))
    }
}

/// Wraps extracted records, logging when rows had to be dropped.
fn finish<T>(
    extractor: &str,
    semester_id: Option<&str>,
    extraction: Extraction<T>,
) -> Fetched<Vec<T>> {
    let incomplete = extraction.incomplete(extractor);
    if let Some(incomplete) = &incomplete {
        warn!(
            extractor,
            rejected = incomplete.rejected,
            records = extraction.records.len(),
            "Extraction dropped rows"
        );
    }
    Fetched::new(semester_id, extraction.records, incomplete)
}
