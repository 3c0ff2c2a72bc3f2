//! Runtime configuration, with `DOCVERIFY_*` environment overrides.

use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use time::Duration;

use crate::document::DEFAULT_MAX_FILE_BYTES;
use crate::otp::DEFAULT_OTP_TTL;

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_checker_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

const DEFAULT_CHECKER_TIMEOUT: StdDuration = StdDuration::from_secs(30);
const DEFAULT_SESSION_IDLE: Duration = Duration::minutes(30);

/// Settings for the engine and its HTTP surface.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Address the demo server listens on.
    pub bind_addr: SocketAddr,
    /// Base URL of the document-check service.
    pub checker_url: String,
    /// Advisory client-side timeout for one document check.
    pub checker_timeout: StdDuration,
    /// Validity window of an issued OTP.
    pub otp_ttl: Duration,
    /// Largest accepted upload, inclusive.
    pub max_file_bytes: u64,
    /// Simulated delivery: return the code in the issue response.
    pub echo_otp: bool,
    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,
    /// Cookie sessions expire after this much inactivity.
    pub session_idle: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            checker_url: default_checker_url(),
            checker_timeout: DEFAULT_CHECKER_TIMEOUT,
            otp_ttl: DEFAULT_OTP_TTL,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            echo_otp: true,
            secure_cookie: false,
            session_idle: DEFAULT_SESSION_IDLE,
        }
    }
}

impl VerificationConfig {
    /// Reads `DOCVERIFY_*` variables; unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_parse("DOCVERIFY_BIND").unwrap_or(defaults.bind_addr),
            checker_url: std::env::var("DOCVERIFY_CHECKER_URL").unwrap_or(defaults.checker_url),
            checker_timeout: env_parse("DOCVERIFY_CHECKER_TIMEOUT_SECS")
                .map(StdDuration::from_secs)
                .unwrap_or(defaults.checker_timeout),
            otp_ttl: env_parse("DOCVERIFY_OTP_TTL_SECS")
                .map(Duration::seconds)
                .unwrap_or(defaults.otp_ttl),
            max_file_bytes: env_parse("DOCVERIFY_MAX_FILE_BYTES")
                .unwrap_or(defaults.max_file_bytes),
            echo_otp: env_flag("DOCVERIFY_ECHO_OTP").unwrap_or(defaults.echo_otp),
            secure_cookie: env_flag("DOCVERIFY_SECURE_COOKIE")
                .unwrap_or(defaults.secure_cookie),
            session_idle: env_parse("DOCVERIFY_SESSION_IDLE_SECS")
                .map(Duration::seconds)
                .unwrap_or(defaults.session_idle),
        }
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_checker_url(mut self, url: impl Into<String>) -> Self {
        self.checker_url = url.into();
        self
    }

    pub fn with_checker_timeout(mut self, timeout: StdDuration) -> Self {
        self.checker_timeout = timeout;
        self
    }

    pub fn with_otp_ttl(mut self, ttl: Duration) -> Self {
        self.otp_ttl = ttl;
        self
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn with_echo_otp(mut self, echo: bool) -> Self {
        self.echo_otp = echo;
        self
    }

    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    pub fn with_session_idle(mut self, idle: Duration) -> Self {
        self.session_idle = idle;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    let value = value.trim();
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
