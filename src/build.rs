use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli::{CreateDocsetArgs, PageSourceKind};
use crate::config::{RetryPolicy, SiteConfig};
use crate::crawl::{CrawlContext, DEFAULT_SAMPLE_PAGES};
use crate::fetch::{HttpFetcher, PageSource};
use crate::formats::ContentIndex;
use crate::index::DedupPolicy;
use crate::package::DocsetLayout;

/// Stage folders inside the build folder. Each stage starts from a copy of the previous one.
#[derive(Debug, Clone)]
pub struct BuildLayout {
    pub root: PathBuf,
    pub win32_source_dir: PathBuf,
    pub sdk_api_source_dir: PathBuf,
    pub download_dir: PathBuf,
    pub rewrite_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub package_dir: PathBuf,
    pub docset: DocsetLayout,
}

impl BuildLayout {
    pub fn new(root: &Path, site: &SiteConfig) -> Self {
        let package_dir = root.join("_4_ready_to_be_packaged");
        Self {
            root: root.to_path_buf(),
            win32_source_dir: root.join("_0_win32_source"),
            sdk_api_source_dir: root.join("_0_api_sdk_source"),
            download_dir: root.join("_1_downloaded_contents"),
            rewrite_dir: root.join("_2_html_rewrite"),
            resources_dir: root.join("_3_additional_resources"),
            docset: DocsetLayout::new(&package_dir, site),
            package_dir,
        }
    }

    /// Snapshot of the crawl results, reused by `--reuse-crawl`.
    pub fn content_index_path(&self) -> PathBuf {
        self.download_dir.join("toc.json")
    }

    pub fn create_dirs(&self) -> anyhow::Result<()> {
        for dir in [
            &self.win32_source_dir,
            &self.sdk_api_source_dir,
            &self.download_dir,
            &self.rewrite_dir,
            &self.resources_dir,
            &self.package_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create build dir: {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Where rendered pages come from for this build.
enum Pages<'a> {
    Http(&'a HttpFetcher),
    #[cfg(feature = "browser")]
    Browser(crate::browser::BrowserPageSource),
}

impl<'a> Pages<'a> {
    fn open(kind: PageSourceKind, fetcher: &'a HttpFetcher) -> anyhow::Result<Self> {
        match kind {
            PageSourceKind::Http => Ok(Self::Http(fetcher)),
            #[cfg(feature = "browser")]
            PageSourceKind::Browser => Ok(Self::Browser(
                crate::browser::BrowserPageSource::launch().context("launch browser")?,
            )),
            #[cfg(not(feature = "browser"))]
            PageSourceKind::Browser => {
                anyhow::bail!("browser page source requires the `browser` cargo feature")
            }
        }
    }

    fn source(&self) -> &dyn PageSource {
        match self {
            Self::Http(fetcher) => *fetcher,
            #[cfg(feature = "browser")]
            Self::Browser(browser) => browser,
        }
    }
}

pub fn run(args: CreateDocsetArgs) -> anyhow::Result<()> {
    let site = SiteConfig::from_env()
        .with_base_url(args.base_url.as_deref())
        .validate()?;
    let policy = RetryPolicy::from_env()?;

    // Held until the end of the build; dropping it removes the folder.
    let temp_dir = if args.temporary {
        Some(
            tempfile::Builder::new()
                .prefix("msdn-docset-")
                .tempdir()
                .context("create temporary build dir")?,
        )
    } else {
        None
    };
    let build_root = match &temp_dir {
        Some(dir) => dir.path().to_path_buf(),
        None => PathBuf::from(&args.build_dir),
    };

    let layout = BuildLayout::new(&build_root, &site);
    tracing::info!(build_dir = %layout.root.display(), "[0] prepare folders");
    layout.create_dirs()?;

    let fetcher = HttpFetcher::new(&site, policy)?;

    let content = if args.reuse_crawl {
        let path = layout.content_index_path();
        tracing::info!(snapshot = %path.display(), "[1] reuse previous crawl");
        ContentIndex::read(&path)?
    } else {
        let pages = Pages::open(args.page_source, &fetcher)?;
        let ctx = CrawlContext {
            site: &site,
            pages: pages.source(),
            toc: &fetcher,
            max_pages: args.sampling.then_some(DEFAULT_SAMPLE_PAGES),
        };
        crawl_stage(&layout, &ctx, &fetcher)?
    };

    let options = PackageOptions {
        output: PathBuf::from(&args.output),
        dedup: DedupPolicy::from_strict(args.strict_dedup),
    };
    finish(&layout, &site, &fetcher, &content, &options)?;

    if let Some(dir) = temp_dir {
        dir.close().context("remove temporary build dir")?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PackageOptions {
    pub output: PathBuf,
    pub dedup: DedupPolicy,
}

/// Downloads the markdown sources, crawls both trees and saves the content index snapshot.
pub fn crawl_stage(
    layout: &BuildLayout,
    ctx: &CrawlContext<'_>,
    fetcher: &HttpFetcher,
) -> anyhow::Result<ContentIndex> {
    tracing::info!("[1] download markdown sources");
    crate::sources::fetch_sources(
        fetcher,
        ctx.site,
        &layout.win32_source_dir,
        &layout.sdk_api_source_dir,
    )?;

    tracing::info!(sampling = ?ctx.max_pages, "[1] crawl web contents");
    let content = crate::crawl::crawl_all(
        ctx,
        &layout.win32_source_dir,
        &layout.sdk_api_source_dir,
        &layout.download_dir,
    )?;
    content.write(&layout.content_index_path())?;
    Ok(content)
}

/// Runs the offline stages on a finished crawl: rewrite, resources, index, archive.
pub fn finish(
    layout: &BuildLayout,
    site: &SiteConfig,
    fetcher: &HttpFetcher,
    content: &ContentIndex,
    options: &PackageOptions,
) -> anyhow::Result<()> {
    tracing::info!("[2] rewrite urls and hrefs");
    crate::package::copy_folder(&layout.download_dir, &layout.rewrite_dir)?;
    let resources = crate::rewrite::rewrite_tree(&layout.rewrite_dir, site)?;

    tracing::info!(resources = resources.len(), "[3] download style contents");
    crate::package::copy_folder(&layout.rewrite_dir, &layout.resources_dir)?;
    crate::resources::download_resources(fetcher, &layout.resources_dir, &resources)?;
    crate::resources::install_start_page(&layout.resources_dir, site)?;

    tracing::info!(records = content.len(), "[4] index to database");
    crate::package::copy_folder(&layout.resources_dir, &layout.docset.documents_dir)?;
    crate::index::build_index(content, &layout.docset.index_path(), options.dedup)?;

    tracing::info!(output = %options.output.display(), "[5] package docset");
    crate::package::install_static_assets(&layout.docset)?;
    crate::package::make_archive(&layout.docset.docset_dir, &options.output)?;
    Ok(())
}
