//! Assets referenced by rewritten pages but not part of the crawl.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context as _;

use crate::config::SiteConfig;
use crate::crawl::join_segments;
use crate::fetch::HttpFetcher;
use crate::formats::ThemeResource;

const START_PAGE_SOURCE: &str = "desktop-app-technologies.html";
const START_PAGE: &str = "index.html";

/// Downloads theme stylesheets below `documents_dir`; returns how many were fetched.
pub fn download_resources(
    fetcher: &HttpFetcher,
    documents_dir: &Path,
    resources: &BTreeSet<ThemeResource>,
) -> anyhow::Result<usize> {
    let mut downloaded = 0;
    for resource in resources {
        let url = url::Url::parse(&resource.url)
            .with_context(|| format!("invalid resource url: {}", resource.url))?;
        let segments: Vec<&str> = resource.path.split('/').filter(|s| !s.is_empty()).collect();
        let destination = join_segments(documents_dir, &segments);

        tracing::info!(%url, destination = %destination.display(), "download resource");
        if fetcher.fetch_text(&url, &destination)? {
            downloaded += 1;
        } else {
            tracing::warn!(%url, "resource not available");
        }
    }
    Ok(downloaded)
}

/// Copies the desktop technologies landing page to the docset start page.
///
/// Returns `false` when the landing page was not crawled.
pub fn install_start_page(documents_dir: &Path, site: &SiteConfig) -> anyhow::Result<bool> {
    let win32_dir = documents_dir.join(&site.domain).join("win32");
    let source = win32_dir.join(START_PAGE_SOURCE);
    if !source.is_file() {
        tracing::warn!(page = %source.display(), "start page source missing");
        return Ok(false);
    }
    let destination = win32_dir.join(START_PAGE);
    std::fs::copy(&source, &destination).with_context(|| {
        format!(
            "copy start page: {} -> {}",
            source.display(),
            destination.display()
        )
    })?;
    Ok(true)
}
