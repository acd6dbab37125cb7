//! Configuration options for the booking client

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Default API root of a local backend
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/";

/// Configuration options for the booking client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL every endpoint path is joined onto
    pub api_url: String,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Where to persist the session; `None` keeps it in memory
    pub session_file: Option<PathBuf>,

    /// Token-issue endpoint
    pub token_path: String,

    /// Token-refresh endpoint
    pub refresh_path: String,

    /// Where callers should send the user when the session is gone
    pub login_route: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            session_file: None,
            token_path: "token/".to_string(),
            refresh_path: "token/refresh/".to_string(),
            login_route: "/login".to_string(),
        }
    }
}

impl ClientOptions {
    /// Read options from the environment, loading a `.env` file first if present
    ///
    /// * `TUTOR_BOOKING_API_URL`
    /// * `TUTOR_BOOKING_TIMEOUT_SECS`
    /// * `TUTOR_BOOKING_SESSION_FILE`
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let mut options = Self::default();
        if let Ok(url) = std::env::var("TUTOR_BOOKING_API_URL") {
            options = options.with_api_url(&url);
        }
        if let Ok(secs) = std::env::var("TUTOR_BOOKING_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::config(format!("TUTOR_BOOKING_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            options = options.with_request_timeout(Some(Duration::from_secs(secs)));
        }
        if let Ok(path) = std::env::var("TUTOR_BOOKING_SESSION_FILE") {
            options = options.with_session_file(Some(PathBuf::from(path)));
        }
        Ok(options)
    }

    /// Set the API base URL
    pub fn with_api_url(mut self, value: &str) -> Self {
        self.api_url = value.to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the session file
    pub fn with_session_file(mut self, value: Option<PathBuf>) -> Self {
        self.session_file = value;
        self
    }

    /// Set the token-issue endpoint
    pub fn with_token_path(mut self, value: &str) -> Self {
        self.token_path = value.to_string();
        self
    }

    /// Set the token-refresh endpoint
    pub fn with_refresh_path(mut self, value: &str) -> Self {
        self.refresh_path = value.to_string();
        self
    }

    /// Set the login route reported with [`crate::auth::SessionEvent::LoginRequired`]
    pub fn with_login_route(mut self, value: &str) -> Self {
        self.login_route = value.to_string();
        self
    }

    /// Parse `api_url`, forcing a trailing slash so relative joins keep the prefix
    pub fn base_url(&self) -> Result<Url, Error> {
        let mut raw = self.api_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)?;
        if url.cannot_be_a_base() {
            return Err(Error::config(format!("API URL cannot be a base: {}", raw)));
        }
        Ok(url)
    }
}
