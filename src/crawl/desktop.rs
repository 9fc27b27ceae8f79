//! Crawler for the flat Win32 `desktop-src` tree.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use walkdir::WalkDir;

use super::{CrawlContext, PageBudget, file_stem, join_segments, relative_segments};
use crate::formats::{Category, ContentIndex, IndexEntry};
use crate::rewrite::DESKTOP_MIRROR;
use crate::toc::TocDocument;

/// Location of the page sources inside the extracted `win32` archive.
pub const SOURCE_SUBDIR: [&str; 2] = ["win32-docs", "desktop-src"];

const SITE_ROOT: &str = "en-us/windows/win32";
const SCHEMA_DIR_MARKER: &str = "ADSchema";
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub fn crawl(
    ctx: &CrawlContext<'_>,
    source_root: &Path,
    download_dir: &Path,
) -> anyhow::Result<ContentIndex> {
    let mut crawler = DesktopCrawler {
        ctx,
        download_dir,
        budget: ctx.budget(),
        index: ContentIndex::default(),
        tocs: BTreeMap::new(),
    };

    for entry in WalkDir::new(source_root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk sources: {}", source_root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("source file has no parent: {}", path.display()))?;
        let dir = relative_segments(parent, source_root)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => crawler.copy_image(path, &dir)?,
            Some("md") => {
                if !crawler.crawl_page(path, &dir)? {
                    tracing::info!("page budget exhausted; stopping win32 crawl");
                    break;
                }
            }
            _ => {}
        }
    }

    let DesktopCrawler {
        mut index, tocs, ..
    } = crawler;
    for (dir, toc) in tocs {
        index
            .toc
            .insert(format!("desktop-src/{dir}"), toc.raw().clone());
    }
    Ok(index)
}

/// Category of a page from its folder and filename prefix.
pub fn classify(dir: &str, stem: &str) -> Category {
    if dir.contains(SCHEMA_DIR_MARKER) {
        if stem.starts_with("c-") {
            return Category::Classes;
        }
        if stem.starts_with("a-") {
            return Category::Attributes;
        }
    }
    Category::Entries
}

struct DesktopCrawler<'a, 'c> {
    ctx: &'a CrawlContext<'c>,
    download_dir: &'a Path,
    budget: PageBudget,
    index: ContentIndex,
    tocs: BTreeMap<String, TocDocument>,
}

impl DesktopCrawler<'_, '_> {
    fn mirror_segments(&self, dir: &[String]) -> Vec<String> {
        let mut segments = vec![self.ctx.site.domain.clone()];
        segments.extend(DESKTOP_MIRROR.iter().map(|s| (*s).to_owned()));
        segments.extend(dir.iter().cloned());
        segments
    }

    fn copy_image(&self, path: &Path, dir: &[String]) -> anyhow::Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("image has no file name: {}", path.display()))?;
        let image_dir = join_segments(self.download_dir, &self.mirror_segments(dir));
        std::fs::create_dir_all(&image_dir)
            .with_context(|| format!("create image dir: {}", image_dir.display()))?;
        let destination = image_dir.join(file_name);
        std::fs::copy(path, &destination).with_context(|| {
            format!(
                "copy image: {} -> {}",
                path.display(),
                destination.display()
            )
        })?;
        Ok(())
    }

    /// Returns `false` once the page budget is spent.
    fn crawl_page(&mut self, source: &Path, dir: &[String]) -> anyhow::Result<bool> {
        let stem = file_stem(source)?;
        let dir_path = dir.join("/");

        let site_path = if dir.is_empty() {
            format!("{SITE_ROOT}/{stem}")
        } else {
            format!("{SITE_ROOT}/{dir_path}/{stem}")
        };
        let url = self.ctx.site.site_url(&site_path)?;

        let mirror_dir = self.mirror_segments(dir);
        let mut page_segments = mirror_dir.clone();
        page_segments.push(format!("{stem}.html"));
        let destination = join_segments(self.download_dir, &page_segments);
        let page_path = page_segments.join("/");

        if !self.budget.take() {
            return Ok(false);
        }
        tracing::debug!(%url, destination = %destination.display(), "download page");
        if !self.ctx.pages.fetch_page(&url, &destination)? {
            tracing::info!(%url, "could not download page");
            return Ok(true);
        }

        // Top-level pages are mirrored but not indexed.
        if dir.is_empty() {
            return Ok(true);
        }

        if !self.tocs.contains_key(&dir_path) {
            let toc = self.discover_folder(&dir_path, &mirror_dir, stem, &page_path)?;
            self.tocs.insert(dir_path.clone(), toc);
        }

        let title = self
            .tocs
            .get(&dir_path)
            .and_then(|toc| toc.resolve_title(stem))
            .unwrap_or(stem)
            .to_owned();
        let category = classify(&dir_path, stem);
        if category != Category::Entries {
            tracing::debug!(page = stem, ?category, "schema page");
        }
        self.index.push(category, IndexEntry::new(title, page_path));
        Ok(true)
    }

    /// Fetches a folder's TOC on first visit and records the folder as a guide.
    fn discover_folder(
        &mut self,
        dir_path: &str,
        mirror_dir: &[String],
        stem: &str,
        page_path: &str,
    ) -> anyhow::Result<TocDocument> {
        let Some(toc) = self.ctx.fetch_toc(&format!("{SITE_ROOT}/{dir_path}"))? else {
            tracing::warn!(dir = dir_path, "folder has no toc");
            self.index
                .push(Category::Guides, IndexEntry::new(stem, page_path));
            return Ok(TocDocument::empty());
        };

        let name = toc.top_title().unwrap_or(stem).to_owned();
        let path = match toc.top_href() {
            Some(href) => format!("{}/{href}.html", mirror_dir.join("/")),
            None => page_path.to_owned(),
        };
        self.index.push(Category::Guides, IndexEntry::new(name, path));
        Ok(toc)
    }
}
