//! Authenticated session against the booking portal

use std::fmt;
use std::time::Duration;

use seasonscan_engine::{LookupRequest, RawResponse, Transport, TransportError};

pub const DEFAULT_BASE_URL: &str = "https://www.timb.co.zw/booking/";
const LOGIN_PATH: &str = "index.php?module=login&item=card";
const ANALYSIS_PATH: &str = "index.php?module=grower&item=analysis";

/// Connect timeout for establishing TCP connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Shown on every page once the session is gone.
pub const LOGGED_OUT_MARKER: &str = "Not logged in";
const WELCOME_MARKER: &str = "Welcome";

/// Where the portal lives and how long one request may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PortalConfig {
    fn url(&self, path: &str) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    pub fn login_url(&self) -> String {
        self.url(LOGIN_PATH)
    }

    pub fn analysis_url(&self) -> String {
        self.url(ANALYSIS_PATH)
    }
}

/// Portal account. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Logged-in portal session; the session cookie lives in the client.
pub struct PortalClient {
    client: reqwest::Client,
    analysis_url: String,
}

impl PortalClient {
    /// Open a session. Rejected credentials come back as `Auth`.
    pub async fn login(
        config: &PortalConfig,
        credentials: &Credentials,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(classify)?;

        log::info!("Logging in to {} as {}", config.base_url, credentials.username);
        let form = [
            ("name", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("login", "Login"),
        ];
        let body = client
            .post(config.login_url())
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(classify)?
            .text()
            .await
            .map_err(classify)?;

        if !body.contains(WELCOME_MARKER) || body.contains(LOGGED_OUT_MARKER) {
            return Err(TransportError::Auth(format!(
                "login rejected for {}",
                credentials.username
            )));
        }
        log::info!("Login successful");

        Ok(Self {
            client,
            analysis_url: config.analysis_url(),
        })
    }
}

impl Transport for PortalClient {
    async fn fetch(&self, request: &LookupRequest) -> Result<RawResponse, TransportError> {
        let number = request.identifier.number().to_string();
        let season = request.period.to_string();
        let form = analysis_form(request.identifier.prefix(), &number, &season);

        let body = self
            .client
            .post(&self.analysis_url)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(classify)?
            .text()
            .await
            .map_err(classify)?;

        if body.contains(LOGGED_OUT_MARKER) {
            return Err(TransportError::Auth(format!(
                "session expired while fetching {request}"
            )));
        }
        Ok(RawResponse::new(body))
    }
}

/// Form fields of the "Show Analysis" button.
fn analysis_form<'a>(prefix: &'a str, number: &'a str, season: &'a str) -> [(&'static str, &'a str); 5] {
    [
        ("deleteprefix", prefix),
        ("deletegnumber", number),
        ("deletesuffix", ""),
        ("season", season),
        ("download", "Show Analysis"),
    ]
}

/// Timeouts are their own class; everything else reqwest reports is a
/// network failure. URLs are stripped from messages.
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.without_url().to_string())
    } else {
        TransportError::Network(e.without_url().to_string())
    }
}
