use std::time::Duration;

use anyhow::Context as _;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://docs.microsoft.com";
pub const DEFAULT_DOMAIN: &str = "docs.microsoft.com";
pub const DEFAULT_THEME_URI: &str = "_themes/docs.theme/master/en-us/_themes";
pub const DEFAULT_DOCSET_NAME: &str = "MSDN";

const WIN32_SOURCE_URL: &str = "https://github.com/MicrosoftDocs/win32/archive/refs/heads/docs.zip";
const SDK_API_SOURCE_URL: &str =
    "https://github.com/MicrosoftDocs/sdk-api/archive/refs/heads/docs.zip";

/// Constants describing the documentation site and the docset being built.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Origin pages, TOCs and stylesheets are fetched from.
    pub base_url: String,
    /// Name of the mirror folder under the documents root.
    pub domain: String,
    /// Path prefix of the shared theme stylesheets.
    pub theme_uri: String,
    pub docset_name: String,
    pub win32_source_url: String,
    pub sdk_api_source_url: String,
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            domain: DEFAULT_DOMAIN.to_owned(),
            theme_uri: DEFAULT_THEME_URI.to_owned(),
            docset_name: DEFAULT_DOCSET_NAME.to_owned(),
            win32_source_url: WIN32_SOURCE_URL.to_owned(),
            sdk_api_source_url: SDK_API_SOURCE_URL.to_owned(),
            user_agent: format!("msdn-docset/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SiteConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("MSDN_DOCSET_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(url) = std::env::var("MSDN_DOCSET_WIN32_SOURCE_URL") {
            config.win32_source_url = url;
        }
        if let Ok(url) = std::env::var("MSDN_DOCSET_SDK_API_SOURCE_URL") {
            config.sdk_api_source_url = url;
        }
        config
    }

    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url.to_owned();
        }
        self
    }

    /// Checks that `base_url` is an http(s) origin and strips any trailing `/`.
    pub fn validate(mut self) -> anyhow::Result<Self> {
        let url = Url::parse(&self.base_url).context("parse base url")?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("base url must be http/https: {url}");
        }
        self.base_url = self.base_url.trim_end_matches('/').to_owned();
        Ok(self)
    }

    /// Absolute URL of a site path such as `en-us/windows/win32/api`.
    pub fn site_url(&self, path: &str) -> anyhow::Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).with_context(|| format!("parse site url: {raw}"))
    }
}

/// Retry behavior of [`crate::fetch::HttpFetcher`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries granted to responses whose status is in `retry_statuses`.
    pub max_retries: u32,
    /// First backoff interval; doubled on each subsequent retry.
    pub backoff: Duration,
    pub retry_statuses: Vec<u16>,
    /// Delay between attempts after a connection failure. These are retried forever.
    pub connect_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_secs(1),
            retry_statuses: vec![502, 503, 504],
            connect_retry_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut policy = Self::default();
        if let Ok(raw) = std::env::var("MSDN_DOCSET_MAX_RETRIES") {
            policy.max_retries = raw
                .parse()
                .with_context(|| format!("parse MSDN_DOCSET_MAX_RETRIES: {raw}"))?;
        }
        if let Ok(raw) = std::env::var("MSDN_DOCSET_BACKOFF_MS") {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("parse MSDN_DOCSET_BACKOFF_MS: {raw}"))?;
            policy.backoff = Duration::from_millis(millis);
        }
        if let Ok(raw) = std::env::var("MSDN_DOCSET_CONNECT_RETRY_MS") {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("parse MSDN_DOCSET_CONNECT_RETRY_MS: {raw}"))?;
            policy.connect_retry_delay = Duration::from_millis(millis);
        }
        Ok(policy)
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2_u32.saturating_pow(attempt))
    }
}
