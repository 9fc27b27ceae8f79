use clap::{Args, Parser, Subcommand, ValueEnum};

/// Dash docset creation tool for the Win32 API documentation.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (debug logs).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl the documentation site and package it as a docset archive.
    CreateDocset(CreateDocsetArgs),
    /// Rewrite a single downloaded page, to check the rewriting rules.
    RewriteHtml(RewriteHtmlArgs),
    /// Build a lookup store from a content index snapshot.
    Index(IndexArgs),
}

/// How rendered pages are retrieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PageSourceKind {
    /// Plain HTTP GET of the served HTML.
    #[default]
    Http,
    /// Headless Chrome rendering (requires the `browser` feature).
    Browser,
}

#[derive(Debug, Args)]
pub struct CreateDocsetArgs {
    /// Use a temporary directory for the build folder, removed afterwards.
    #[arg(short, long)]
    pub temporary: bool,

    /// Build folder holding every intermediate stage.
    #[arg(long, default_value = "_build_msdn", conflicts_with = "temporary")]
    pub build_dir: String,

    /// Output archive path.
    #[arg(short, long, default_value = "MSDN.tgz")]
    pub output: String,

    /// Only crawl a sample of pages, to check the rewriting rules quickly.
    #[arg(short, long)]
    pub sampling: bool,

    /// Reuse the content index saved by a previous crawl instead of crawling again.
    #[arg(long, conflicts_with = "temporary")]
    pub reuse_crawl: bool,

    /// Page retrieval strategy.
    #[arg(long, value_enum, default_value_t = PageSourceKind::Http)]
    pub page_source: PageSourceKind,

    /// Documentation site origin (overrides MSDN_DOCSET_BASE_URL).
    #[arg(long)]
    pub base_url: Option<String>,

    /// Only skip lookup records whose name, type and path all match an existing row.
    #[arg(long)]
    pub strict_dedup: bool,
}

#[derive(Debug, Args)]
pub struct RewriteHtmlArgs {
    /// Downloaded page to rewrite.
    pub input: String,

    /// Where to write the rewritten page.
    pub output: String,

    /// Documents root the input page lives under.
    pub html_root_dir: String,

    /// Documentation site origin (overrides MSDN_DOCSET_BASE_URL).
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Content index snapshot (`toc.json`) written by a crawl.
    #[arg(long)]
    pub content_index: String,

    /// Output `docSet.dsidx` path.
    #[arg(long)]
    pub out: String,

    /// Only skip lookup records whose name, type and path all match an existing row.
    #[arg(long)]
    pub strict_dedup: bool,
}
