//! Crawler for the `sdk-api-src` reference, one folder per Windows header.

use std::path::Path;

use anyhow::Context as _;

use super::{CrawlContext, PageBudget, file_stem, join_segments};
use crate::formats::{Category, ContentIndex, IndexEntry};
use crate::rewrite::API_MIRROR;
use crate::toc::TocDocument;

/// Location of the per-header folders inside the extracted `sdk-api` archive.
pub const SOURCE_SUBDIR: [&str; 3] = ["sdk-api-docs", "sdk-api-src", "content"];

const SITE_ROOT: &str = "en-us/windows/win32/api";
const TITLE_KEY_ROOT: &str = "/windows/win32/api";

/// TOC titles of grouping pages that carry no content of their own.
const SYNTHETIC_TITLES: [&str; 4] = ["about", "functions", "providers", "provider"];

pub fn crawl(
    ctx: &CrawlContext<'_>,
    content_root: &Path,
    download_dir: &Path,
) -> anyhow::Result<ContentIndex> {
    let mut index = ContentIndex::default();
    let mut budget = ctx.budget();

    for dir in header_dirs(content_root)? {
        let Some(toc) = ctx.fetch_toc(&format!("{SITE_ROOT}/{dir}"))? else {
            tracing::warn!(dir = %dir, "header folder has no toc; skipping");
            continue;
        };

        if !budget.take() {
            tracing::info!("page budget exhausted; stopping sdk-api crawl");
            break;
        }
        crawl_landing_page(ctx, &dir, &toc, download_dir, &mut index)?;

        let folder = FolderCrawl {
            ctx,
            dir: &dir,
            toc: &toc,
            download_dir,
        };
        let keep_going = folder.crawl(&content_root.join(&dir), &mut budget, &mut index)?;
        index
            .toc
            .insert(format!("sdk-api-src/{dir}"), toc.raw().clone());
        if !keep_going {
            tracing::info!("page budget exhausted; stopping sdk-api crawl");
            break;
        }
    }

    Ok(index)
}

/// Category of an API page from its filename prefix.
pub fn classify(stem: &str) -> Category {
    match stem.get(..3) {
        Some("nc-") => Category::Callbacks,
        Some("ne-") => Category::Enums,
        Some("nf-") => Category::Functions,
        Some("nn-") => Category::Interfaces,
        Some("ns-") => Category::Structures,
        Some("nl-") => Category::Classes,
        _ => Category::Entries,
    }
}

/// Grouping pages such as "Functions" that only list their siblings.
pub fn is_synthetic_title(title: &str) -> bool {
    SYNTHETIC_TITLES
        .iter()
        .any(|synthetic| title.eq_ignore_ascii_case(synthetic))
}

fn header_dirs(content_root: &Path) -> anyhow::Result<Vec<String>> {
    let entries = std::fs::read_dir(content_root)
        .with_context(|| format!("read api sources: {}", content_root.display()))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read api sources: {}", content_root.display()))?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn mirror_segments(ctx: &CrawlContext<'_>, dir: &str, file: String) -> Vec<String> {
    let mut segments = vec![ctx.site.domain.clone()];
    segments.extend(API_MIRROR.iter().map(|s| (*s).to_owned()));
    segments.push(dir.to_owned());
    segments.push(file);
    segments
}

/// Downloads the header's own landing page and records it as a file or category.
fn crawl_landing_page(
    ctx: &CrawlContext<'_>,
    dir: &str,
    toc: &TocDocument,
    download_dir: &Path,
    index: &mut ContentIndex,
) -> anyhow::Result<()> {
    let url = ctx.site.site_url(&format!("{SITE_ROOT}/{dir}"))?;
    let segments = mirror_segments(ctx, dir, "index.html".to_owned());
    let destination = join_segments(download_dir, &segments);

    tracing::debug!(%url, destination = %destination.display(), "download header page");
    if !ctx.pages.fetch_page(&url, &destination)? {
        tracing::info!(%url, "could not download header page");
        return Ok(());
    }

    let category = if dir.starts_with('_') {
        Category::Categories
    } else {
        Category::Files
    };
    let name = toc.top_title().unwrap_or(dir);
    index.push(category, IndexEntry::new(name, segments.join("/")));
    Ok(())
}

struct FolderCrawl<'a, 'c> {
    ctx: &'a CrawlContext<'c>,
    dir: &'a str,
    toc: &'a TocDocument,
    download_dir: &'a Path,
}

impl FolderCrawl<'_, '_> {
    /// Returns `false` once the page budget is spent.
    fn crawl(
        &self,
        source_dir: &Path,
        budget: &mut PageBudget,
        index: &mut ContentIndex,
    ) -> anyhow::Result<bool> {
        for source in markdown_files(source_dir)? {
            let stem = file_stem(&source)?;
            if stem == "index" {
                continue;
            }
            if !budget.take() {
                return Ok(false);
            }
            self.crawl_page(stem, index)?;
        }
        Ok(true)
    }

    fn crawl_page(&self, stem: &str, index: &mut ContentIndex) -> anyhow::Result<()> {
        let url = self
            .ctx
            .site
            .site_url(&format!("{SITE_ROOT}/{}/{stem}", self.dir))?;
        let segments = mirror_segments(self.ctx, self.dir, format!("{stem}.html"));
        let destination = join_segments(self.download_dir, &segments);

        tracing::debug!(%url, destination = %destination.display(), "download page");
        if !self.ctx.pages.fetch_page(&url, &destination)? {
            tracing::info!(%url, "could not download page");
            return Ok(());
        }

        let key = format!("{TITLE_KEY_ROOT}/{}/{stem}", self.dir);
        let title = self.toc.resolve_title(&key).unwrap_or(stem);
        if is_synthetic_title(title) {
            tracing::debug!(page = stem, title, "skip grouping page");
            return Ok(());
        }

        index.push(classify(stem), IndexEntry::new(title, segments.join("/")));
        Ok(())
    }
}

fn markdown_files(dir: &Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read header folder: {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("read header folder: {}", dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
