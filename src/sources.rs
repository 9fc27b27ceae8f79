//! Markdown source archives that drive the crawl.

use std::fs::File;
use std::path::Path;

use anyhow::Context as _;

use crate::config::SiteConfig;
use crate::fetch::HttpFetcher;

/// Downloads and unpacks both source archives into their extraction folders.
pub fn fetch_sources(
    fetcher: &HttpFetcher,
    site: &SiteConfig,
    win32_dir: &Path,
    sdk_api_dir: &Path,
) -> anyhow::Result<()> {
    download_and_extract(fetcher, &site.win32_source_url, win32_dir).context("win32 sources")?;
    download_and_extract(fetcher, &site.sdk_api_source_url, sdk_api_dir)
        .context("sdk-api sources")?;
    Ok(())
}

pub fn download_and_extract(
    fetcher: &HttpFetcher,
    archive_url: &str,
    extract_dir: &Path,
) -> anyhow::Result<()> {
    let url = url::Url::parse(archive_url)
        .with_context(|| format!("invalid source archive url: {archive_url}"))?;
    std::fs::create_dir_all(extract_dir)
        .with_context(|| format!("create source dir: {}", extract_dir.display()))?;

    let archive_path = extract_dir.join("source.zip");
    tracing::info!(%url, "download source archive");
    if !fetcher.fetch_binary(&url, &archive_path)? {
        anyhow::bail!("source archive not available: {url}");
    }

    extract_zip(&archive_path, extract_dir)?;
    std::fs::remove_file(&archive_path)
        .with_context(|| format!("remove archive: {}", archive_path.display()))?;
    Ok(())
}

pub fn extract_zip(archive_path: &Path, extract_dir: &Path) -> anyhow::Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("open archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("read archive: {}", archive_path.display()))?;
    tracing::info!(
        archive = %archive_path.display(),
        entries = archive.len(),
        "extract source archive"
    );
    archive
        .extract(extract_dir)
        .with_context(|| format!("extract archive into {}", extract_dir.display()))?;
    Ok(())
}
