//! Headless Chrome page source for pages that only render with JavaScript.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context as _;
use headless_chrome::{Browser, LaunchOptions};
use url::Url;

use crate::fetch::{PageSource, ensure_parent_dir};

const RELAUNCH_DELAY: Duration = Duration::from_secs(5);

/// HTTP status of the document load, `0` when the browser does not report it.
const NAVIGATION_STATUS_JS: &str =
    "performance.getEntriesByType('navigation')[0]?.responseStatus ?? 0";

#[derive(Debug)]
struct RenderedPage {
    html: String,
    status: Option<u64>,
    title: String,
}

impl RenderedPage {
    /// Chrome renders error pages like any other, so a missing page is told
    /// apart by its status, or by the site's "404" title when no status is known.
    fn is_missing(&self) -> bool {
        if self.html.trim().is_empty() {
            return true;
        }
        match self.status {
            Some(status) => status != 200,
            None => self.title.trim_start().starts_with("404"),
        }
    }
}

pub struct BrowserPageSource {
    browser: Mutex<Browser>,
}

impl BrowserPageSource {
    pub fn launch() -> anyhow::Result<Self> {
        Ok(Self {
            browser: Mutex::new(launch_browser()?),
        })
    }

    fn render(&self, url: &Url) -> anyhow::Result<RenderedPage> {
        let browser = self
            .browser
            .lock()
            .map_err(|_| anyhow::anyhow!("browser lock is poisoned"))?;
        let tab = browser.new_tab().context("open browser tab")?;
        tab.navigate_to(url.as_str())
            .with_context(|| format!("navigate to {url}"))?
            .wait_until_navigated()
            .with_context(|| format!("wait for navigation: {url}"))?;

        let status = tab
            .evaluate(NAVIGATION_STATUS_JS, false)
            .context("read navigation status")?
            .value
            .and_then(|value| value.as_u64())
            .filter(|status| *status != 0);
        let title = tab
            .evaluate("document.title", false)
            .context("read page title")?
            .value
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default();
        let html = tab.get_content().context("read rendered page")?;
        if let Err(err) = tab.close(true) {
            tracing::debug!(?err, "close browser tab");
        }
        Ok(RenderedPage {
            html,
            status,
            title,
        })
    }

    fn relaunch(&self) -> anyhow::Result<()> {
        let mut browser = self
            .browser
            .lock()
            .map_err(|_| anyhow::anyhow!("browser lock is poisoned"))?;
        std::thread::sleep(RELAUNCH_DELAY);
        *browser = launch_browser()?;
        Ok(())
    }
}

impl PageSource for BrowserPageSource {
    fn fetch_page(&self, url: &Url, destination: &Path) -> anyhow::Result<bool> {
        let page = match self.render(url) {
            Ok(page) => page,
            Err(err) => {
                // The site may throttle scrapers for a while; back off and try once more.
                tracing::warn!(%url, ?err, "browser fetch failed; relaunching");
                self.relaunch().context("relaunch browser")?;
                self.render(url)?
            }
        };

        if page.is_missing() {
            tracing::debug!(%url, status = ?page.status, title = %page.title, "page is not available");
            return Ok(false);
        }

        ensure_parent_dir(destination)?;
        std::fs::write(destination, page.html)
            .with_context(|| format!("write rendered page: {}", destination.display()))?;
        Ok(true)
    }
}

fn launch_browser() -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        headless: true,
        window_size: Some((1920, 1080)),
        ..Default::default()
    })
    .map_err(|err| anyhow::anyhow!("launch headless chrome: {err}"))
}
