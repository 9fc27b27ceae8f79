//! Crawling of rendered pages, driven by the locally mirrored markdown sources.
//!
//! Two source trees are walked: the flat `desktop-src` tree of the Win32
//! documentation ([`desktop`]) and the directory-per-header `sdk-api-src`
//! API reference ([`sdk_api`]). Both fetch each page's rendered HTML, look its
//! title up in the folder's `toc.json` and classify it into a [`Category`].
//!
//! [`Category`]: crate::formats::Category

pub mod desktop;
pub mod sdk_api;

use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;

use crate::config::SiteConfig;
use crate::fetch::{HttpFetcher, PageSource};
use crate::formats::ContentIndex;
use crate::toc::TocDocument;

/// Pages fetched per source tree when sampling.
pub const DEFAULT_SAMPLE_PAGES: usize = 50;

pub struct CrawlContext<'a> {
    pub site: &'a SiteConfig,
    pub pages: &'a dyn PageSource,
    pub toc: &'a HttpFetcher,
    /// Upper bound on pages fetched by each crawler, `None` for a full crawl.
    pub max_pages: Option<usize>,
}

impl CrawlContext<'_> {
    /// Fetches the `toc.json` published under `site_dir`, `None` when the folder has none.
    pub fn fetch_toc(&self, site_dir: &str) -> anyhow::Result<Option<TocDocument>> {
        let url = self
            .site
            .site_url(&format!("{}/toc.json", site_dir.trim_end_matches('/')))?;
        tracing::info!(%url, "download toc");
        let value = self
            .toc
            .fetch_json(&url)
            .with_context(|| format!("fetch toc: {url}"))?;
        Ok(value.map(TocDocument::from_json))
    }

    fn budget(&self) -> PageBudget {
        PageBudget {
            remaining: self.max_pages,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PageBudget {
    remaining: Option<usize>,
}

impl PageBudget {
    /// Claims one page fetch; `false` once the budget is spent.
    fn take(&mut self) -> bool {
        match self.remaining.as_mut() {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

/// Crawls both source trees found in their extraction folders and merges the results.
pub fn crawl_all(
    ctx: &CrawlContext<'_>,
    win32_source_dir: &Path,
    sdk_api_source_dir: &Path,
    download_dir: &Path,
) -> anyhow::Result<ContentIndex> {
    let desktop_root = join_segments(win32_source_dir, &desktop::SOURCE_SUBDIR);
    tracing::info!(source = %desktop_root.display(), "crawl win32 desktop contents");
    let mut index = desktop::crawl(ctx, &desktop_root, download_dir).context("crawl win32")?;

    let api_root = join_segments(sdk_api_source_dir, &sdk_api::SOURCE_SUBDIR);
    tracing::info!(source = %api_root.display(), "crawl sdk-api contents");
    let api_index = sdk_api::crawl(ctx, &api_root, download_dir).context("crawl sdk-api")?;

    index.merge(api_index);
    tracing::info!(records = index.len(), tocs = index.toc.len(), "crawl finished");
    Ok(index)
}

pub(crate) fn join_segments<S: AsRef<Path>>(root: &Path, segments: &[S]) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in segments {
        path.push(segment);
    }
    path
}

/// Segments of `path` below `root`.
pub(crate) fn relative_segments(path: &Path, root: &Path) -> anyhow::Result<Vec<String>> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not under {}", path.display(), root.display()))?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => anyhow::bail!("unsupported source path: {}", relative.display()),
        }
    }
    Ok(segments)
}

pub(crate) fn file_stem(path: &Path) -> anyhow::Result<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid source filename: {}", path.display()))
}
