use secrecy::SecretString;
use std::time::Duration;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_PENDING_SESSION_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_REDIRECT_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_TOKEN_SWEEP_SECONDS: u64 = 60;
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_REQUEST_PATH: &str = "/request";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    base_url: String,
    session_secret: SecretString,
    session_ttl_seconds: u64,
    pending_session_ttl_seconds: u64,
    token_ttl_seconds: u64,
    redirect_ttl_seconds: u64,
    token_sweep_seconds: u64,
    login_path: String,
    request_path: String,
}

impl GatewayConfig {
    /// `base_url` is the public URL of the gateway; a trailing slash is dropped.
    #[must_use]
    pub fn new(base_url: &str, session_secret: SecretString) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            pending_session_ttl_seconds: DEFAULT_PENDING_SESSION_TTL_SECONDS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            redirect_ttl_seconds: DEFAULT_REDIRECT_TTL_SECONDS,
            token_sweep_seconds: DEFAULT_TOKEN_SWEEP_SECONDS,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            request_path: DEFAULT_REQUEST_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_pending_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.pending_session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_redirect_ttl_seconds(mut self, seconds: u64) -> Self {
        self.redirect_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_sweep_seconds(mut self, seconds: u64) -> Self {
        self.token_sweep_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: &str) -> Self {
        self.login_path = path.to_string();
        self
    }

    #[must_use]
    pub fn with_request_path(mut self, path: &str) -> Self {
        self.request_path = path.to_string();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn pending_session_ttl_seconds(&self) -> u64 {
        self.pending_session_ttl_seconds
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }

    #[must_use]
    pub fn redirect_ttl_seconds(&self) -> u64 {
        self.redirect_ttl_seconds
    }

    /// Sweep interval, never below one second.
    #[must_use]
    pub fn token_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.token_sweep_seconds.max(1))
    }

    /// Absolute URL of the login page.
    #[must_use]
    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, self.login_path)
    }

    /// Absolute URL of the access-request page.
    #[must_use]
    pub fn request_url(&self) -> String {
        format!("{}{}", self.base_url, self.request_path)
    }
}
