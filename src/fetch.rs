use std::fs::File;
use std::io::{BufWriter, Read as _, Write as _};
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::config::{RetryPolicy, SiteConfig};

const CHUNK_SIZE: usize = 32 * 1024;

/// Strategy used to retrieve rendered documentation pages.
pub trait PageSource {
    /// Saves the page at `url` to `destination`. Returns `false` when the page does not exist.
    fn fetch_page(&self, url: &Url, destination: &Path) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    policy: RetryPolicy,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(site: &SiteConfig, policy: RetryPolicy) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            policy,
            user_agent: site.user_agent.clone(),
        })
    }

    /// Downloads `url` as UTF-8 text. Nothing is written unless the final status is 200.
    pub fn fetch_text(&self, url: &Url, destination: &Path) -> anyhow::Result<bool> {
        tracing::debug!(%url, destination = %destination.display(), "fetch text");
        let Some(bytes) = self.fetch_with(url, |response| {
            response.bytes().map_err(|err| ReadError::from_body(err, url))
        })?
        else {
            return Ok(false);
        };
        let text = String::from_utf8_lossy(&bytes);

        ensure_parent_dir(destination)?;
        std::fs::write(destination, text.as_bytes())
            .with_context(|| format!("write text file: {}", destination.display()))?;
        Ok(true)
    }

    /// Streams `url` to `destination` in fixed-size chunks.
    pub fn fetch_binary(&self, url: &Url, destination: &Path) -> anyhow::Result<bool> {
        tracing::debug!(%url, destination = %destination.display(), "fetch binary");
        let written = self.fetch_with(url, |mut response| {
            ensure_parent_dir(destination).map_err(ReadError::Fatal)?;
            let file = File::create(destination)
                .with_context(|| format!("create binary file: {}", destination.display()))
                .map_err(ReadError::Fatal)?;
            let mut out = BufWriter::new(file);
            let mut buf = vec![0_u8; CHUNK_SIZE];
            loop {
                let read = response
                    .read(&mut buf)
                    .with_context(|| format!("read response body: {url}"))
                    .map_err(ReadError::Interrupted)?;
                if read == 0 {
                    break;
                }
                out.write_all(&buf[..read])
                    .with_context(|| format!("write binary file: {}", destination.display()))
                    .map_err(ReadError::Fatal)?;
            }
            out.flush()
                .with_context(|| format!("flush binary file: {}", destination.display()))
                .map_err(ReadError::Fatal)
        })?;
        Ok(written.is_some())
    }

    /// Fetches a JSON document, `None` when the server has no such document.
    pub fn fetch_json(&self, url: &Url) -> anyhow::Result<Option<serde_json::Value>> {
        tracing::debug!(%url, "fetch json");
        let Some(bytes) = self.fetch_with(url, |response| {
            response.bytes().map_err(|err| ReadError::from_body(err, url))
        })?
        else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).with_context(|| format!("parse json: {url}"))?;
        Ok(Some(value))
    }

    /// Issues GET requests until a final status arrives and, on 200, hands the
    /// response to `read`.
    ///
    /// Broken connections are retried without limit, whether they break before
    /// the status line or in the middle of the body. Retryable statuses are
    /// retried up to the policy's limit. Any other status yields `None`.
    fn fetch_with<T>(
        &self,
        url: &Url,
        mut read: impl FnMut(reqwest::blocking::Response) -> Result<T, ReadError>,
    ) -> anyhow::Result<Option<T>> {
        let mut attempt = 0_u32;
        loop {
            let result = self
                .client
                .get(url.clone())
                .header(USER_AGENT, &self.user_agent)
                .header(ACCEPT, "text/html,application/json;q=0.9,*/*;q=0.8")
                .send();

            let response = match result {
                Ok(response) => response,
                Err(err) if is_connection_failure(&err) => {
                    tracing::debug!(%url, ?err, "connection failed; retrying");
                    std::thread::sleep(self.policy.connect_retry_delay);
                    continue;
                }
                Err(err) => return Err(err).with_context(|| format!("GET {url}")),
            };

            let status = response.status().as_u16();
            if self.policy.should_retry_status(status) && attempt < self.policy.max_retries {
                let delay = self.policy.backoff_for(attempt);
                tracing::debug!(%url, status, attempt, ?delay, "server error; retrying");
                std::thread::sleep(delay);
                attempt += 1;
                continue;
            }
            if status != reqwest::StatusCode::OK.as_u16() {
                tracing::debug!(%url, status, "page is not available");
                return Ok(None);
            }

            match read(response) {
                Ok(value) => return Ok(Some(value)),
                Err(ReadError::Interrupted(err)) => {
                    tracing::debug!(%url, err = %format!("{err:#}"), "response body cut short; retrying");
                    std::thread::sleep(self.policy.connect_retry_delay);
                }
                Err(ReadError::Fatal(err)) => return Err(err),
            }
        }
    }
}

/// Failure while consuming a 200 response.
enum ReadError {
    /// The connection broke mid-body; the request is sent again.
    Interrupted(anyhow::Error),
    Fatal(anyhow::Error),
}

impl ReadError {
    fn from_body(err: reqwest::Error, url: &Url) -> Self {
        let interrupted = is_connection_failure(&err);
        let err = anyhow::Error::new(err).context(format!("read response body: {url}"));
        if interrupted {
            Self::Interrupted(err)
        } else {
            Self::Fatal(err)
        }
    }
}

fn is_connection_failure(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() || err.is_decode()
}

impl PageSource for HttpFetcher {
    fn fetch_page(&self, url: &Url, destination: &Path) -> anyhow::Result<bool> {
        self.fetch_text(url, destination)
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }
    Ok(())
}
