//! Offline rewriting of downloaded documentation pages.
//!
//! Each page is rewritten on its own, knowing only its location under the
//! documents root: navigation links are turned into relative `.html` links,
//! site chrome is dropped and theme stylesheets are redirected to a local copy.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::cli::RewriteHtmlArgs;
use crate::config::SiteConfig;
use crate::formats::ThemeResource;

const RELATIVE_LINK: &str = "relative-path";
const ABSOLUTE_LINK: &str = "absolute-path";

const API_PREFIX: &str = "/en-us/windows/win32/api/";
const LEGACY_API_PREFIX: &str = "/en-us/windows/desktop/api/";
const LEGACY_DESKTOP_PREFIX: &str = "/en-us/windows/desktop/";
const SITE_PREFIX: &str = "/en-us/";

/// Local folder of the API reference mirror, below the domain folder.
pub const API_MIRROR: [&str; 4] = ["en-us", "windows", "win32", "api"];
/// Local folder of the desktop technologies mirror, below the domain folder.
pub const DESKTOP_MIRROR: [&str; 1] = ["win32"];

/// Site navigation and page widgets that make no sense offline.
const CHROME_SELECTORS: &[&str] = &[
    r#"nav.doc-outline[role="navigation"]"#,
    r#"ul.breadcrumbs[role="navigation"]"#,
    r#"div.sidebar[role="navigation"]"#,
    "div.dropdown.dropdown-full.mobilenavi",
    "p.api-browser-description",
    "div.api-browser-search-field-container",
    "div.pageActions",
    "div.container.footerContainer",
    "div.dropdown-container",
    "div.binary-rating-buttons",
    "ul.metadata.page-metadata",
    r#"div[data-bi-name="pageactions"]"#,
    "div.page-action-holder",
    "div.header-holder",
    r#"footer#footer[data-bi-name="footer"]"#,
    "div.binary-rating-holder",
    "div#left-container",
    "head script",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenDocument {
    pub html: String,
    pub resources: BTreeSet<ThemeResource>,
}

/// Rewrites one page located at `document_path` inside `documents_root`.
pub fn rewrite_document(
    html: &str,
    document_path: &Path,
    documents_root: &Path,
    site: &SiteConfig,
) -> anyhow::Result<RewrittenDocument> {
    let location = DocumentLocation::new(document_path, documents_root)?;
    let resources = RefCell::new(BTreeSet::new());

    let mut handlers = vec![
        element!("a[data-linktype][href]", |el| {
            let Some(href) = el.get_attribute("href") else {
                return Ok(());
            };
            match el.get_attribute("data-linktype").as_deref() {
                Some(RELATIVE_LINK) => match rewrite_relative_href(&href) {
                    Some(fixed) if fixed != href => {
                        tracing::debug!(from = %href, to = %fixed, "link rewrite");
                        el.set_attribute("href", &fixed)?;
                    }
                    Some(_) => {}
                    None => {
                        tracing::debug!(%href, document = %location, "malformed relative link");
                    }
                },
                Some(ABSOLUTE_LINK) => match translate_absolute_href(&href, &location, site) {
                    AbsoluteLink::Local(fixed) => {
                        tracing::debug!(from = %href, to = %fixed, "link rewrite");
                        el.set_attribute("href", &fixed)?;
                        el.set_attribute("data-linktype", RELATIVE_LINK)?;
                    }
                    AbsoluteLink::External(url) => {
                        el.set_attribute("href", &url)?;
                    }
                    AbsoluteLink::Unchanged => {}
                },
                _ => {}
            }
            Ok(())
        }),
        element!(r#"head link[rel~="stylesheet"][href]"#, |el| {
            let Some(href) = el.get_attribute("href") else {
                return Ok(());
            };
            if let Some((local_href, resource)) = theme_stylesheet(&href, &location, site) {
                el.set_attribute("href", &local_href)?;
                resources.borrow_mut().insert(resource);
            }
            Ok(())
        }),
    ];
    for selector in CHROME_SELECTORS.iter().copied() {
        handlers.push(element!(selector, |el| {
            el.remove();
            Ok(())
        }));
    }

    let html = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|err| anyhow::anyhow!("rewrite html {location}: {err}"))?;

    Ok(RewrittenDocument {
        html,
        resources: resources.into_inner(),
    })
}

/// Rewrites every `*.html` file below `root` in place and returns the theme resources they need.
pub fn rewrite_tree(root: &Path, site: &SiteConfig) -> anyhow::Result<BTreeSet<ThemeResource>> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk html tree: {}", root.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("html")
        {
            pages.push(entry.into_path());
        }
    }
    tracing::info!(pages = pages.len(), root = %root.display(), "rewrite html tree");

    let per_page = pages
        .par_iter()
        .map(|path| rewrite_file(path, root, site))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(per_page.into_iter().flatten().collect())
}

pub fn run(args: RewriteHtmlArgs) -> anyhow::Result<()> {
    let site = SiteConfig::from_env()
        .with_base_url(args.base_url.as_deref())
        .validate()?;
    let input = std::fs::canonicalize(&args.input)
        .with_context(|| format!("resolve input: {}", args.input))?;
    let root = std::fs::canonicalize(&args.html_root_dir)
        .with_context(|| format!("resolve html root dir: {}", args.html_root_dir))?;

    let resources = rewrite_file_to(&input, Path::new(&args.output), &root, &site)?;
    for resource in &resources {
        tracing::info!(url = %resource.url, path = %resource.path, "theme resource");
    }
    tracing::info!(output = %args.output, resources = resources.len(), "page rewritten");
    Ok(())
}

/// Rewrites `input` and writes the result to `output`.
pub fn rewrite_file_to(
    input: &Path,
    output: &Path,
    documents_root: &Path,
    site: &SiteConfig,
) -> anyhow::Result<BTreeSet<ThemeResource>> {
    let html = std::fs::read_to_string(input)
        .with_context(|| format!("read html: {}", input.display()))?;
    let rewritten = rewrite_document(&html, input, documents_root, site)?;
    crate::fetch::ensure_parent_dir(output)?;
    std::fs::write(output, rewritten.html)
        .with_context(|| format!("write html: {}", output.display()))?;
    Ok(rewritten.resources)
}

fn rewrite_file(
    path: &Path,
    root: &Path,
    site: &SiteConfig,
) -> anyhow::Result<BTreeSet<ThemeResource>> {
    tracing::debug!(file = %path.display(), "rewrite html file");
    rewrite_file_to(path, path, root, site)
}

/// Directory of a page, as `/`-free segments relative to the documents root.
#[derive(Debug, Clone)]
struct DocumentLocation {
    dir: Vec<String>,
    file: PathBuf,
}

impl DocumentLocation {
    fn new(document_path: &Path, documents_root: &Path) -> anyhow::Result<Self> {
        let relative = document_path.strip_prefix(documents_root).with_context(|| {
            format!(
                "document {} is not under documents root {}",
                document_path.display(),
                documents_root.display()
            )
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    segments.push(segment.to_string_lossy().into_owned());
                }
                Component::CurDir => {}
                _ => anyhow::bail!("unsupported document path: {}", relative.display()),
            }
        }
        if segments.pop().is_none() {
            anyhow::bail!("document path names no file: {}", document_path.display());
        }

        Ok(Self {
            dir: segments,
            file: relative.to_path_buf(),
        })
    }
}

impl std::fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file.display())
    }
}

/// Rewrites a site-relative navigation link to the offline `.html` convention.
///
/// In-page anchors are returned unchanged. Returns `None` when the link
/// carries no usable target.
pub fn rewrite_relative_href(href: &str) -> Option<String> {
    if href.starts_with('#') {
        return Some(href.to_owned());
    }
    let token = first_url_token(href)?;
    if token.ends_with(".html") {
        return Some(href.to_owned());
    }
    if token.ends_with('/') {
        Some(format!("{token}index.html"))
    } else {
        Some(format!("{token}.html"))
    }
}

/// First run of word characters, `.`, `/` or `-`.
fn first_url_token(href: &str) -> Option<&str> {
    let is_token_char = |c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | '-');
    let start = href.find(is_token_char)?;
    let rest = &href[start..];
    let end = rest.find(|c: char| !is_token_char(c)).unwrap_or(rest.len());
    Some(&rest[..end])
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AbsoluteLink {
    /// Relative link to a page of the local mirror.
    Local(String),
    /// Fully-qualified link to the live site.
    External(String),
    Unchanged,
}

fn translate_absolute_href(
    href: &str,
    location: &DocumentLocation,
    site: &SiteConfig,
) -> AbsoluteLink {
    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };
    let path = path.split('?').next().unwrap_or_default();

    let mirror: &[&str] = &API_MIRROR;
    let (target_root, rest, lowercase) = if let Some(rest) = path.strip_prefix(API_PREFIX) {
        (mirror, rest, true)
    } else if let Some(rest) = path.strip_prefix(LEGACY_API_PREFIX) {
        (mirror, rest, true)
    } else if let Some(rest) = path.strip_prefix(LEGACY_DESKTOP_PREFIX) {
        (&DESKTOP_MIRROR[..], rest, false)
    } else if href.starts_with(SITE_PREFIX) {
        return AbsoluteLink::External(format!("{}{href}", site.base_url));
    } else {
        return AbsoluteLink::Unchanged;
    };

    let mut target = vec![site.domain.clone()];
    target.extend(target_root.iter().map(|s| (*s).to_owned()));
    let base_len = target.len();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if target.len() > base_len {
                    target.pop();
                }
            }
            // API folders and pages are lowercase on disk; legacy links often are not.
            segment if lowercase => target.push(segment.to_ascii_lowercase()),
            segment => target.push(segment.to_owned()),
        }
    }

    let is_index = path.ends_with('/') || target.len() == base_len;
    if !is_index
        && let Some(last) = target.last_mut()
        && let Some(stem) = last.strip_suffix(".html")
    {
        *last = stem.to_owned();
    }
    let rel = relative_href(&location.dir, &target);
    // A folder's own page is its `index.html`, with or without a trailing slash.
    let mut local = if rel == "." {
        "index.html".to_owned()
    } else if is_index {
        format!("{rel}/index.html")
    } else {
        format!("{rel}.html")
    };

    if let Some(fragment) = fragment
        && !fragment.is_empty()
    {
        local.push('#');
        local.push_str(fragment);
    }
    AbsoluteLink::Local(local)
}

fn theme_stylesheet(
    href: &str,
    location: &DocumentLocation,
    site: &SiteConfig,
) -> Option<(String, ThemeResource)> {
    let uri_path = href.trim().trim_start_matches('/');
    if !uri_path.starts_with(&site.theme_uri) {
        return None;
    }

    let file_part = uri_path.split(['?', '#']).next().unwrap_or_default();
    let mut destination = vec![site.domain.clone()];
    destination.extend(
        file_part
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
    );

    let resource = ThemeResource {
        url: format!("{}/{uri_path}", site.base_url),
        path: destination.join("/"),
    };
    Some((relative_href(&location.dir, &destination), resource))
}

/// `/`-separated path from directory `from` to `to`, both relative to the same root.
pub fn relative_href(from: &[String], to: &[String]) -> String {
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::with_capacity(from.len() - common + to.len() - common);
    parts.extend(std::iter::repeat_n("..", from.len() - common));
    parts.extend(to[common..].iter().map(String::as_str));

    if parts.is_empty() {
        ".".to_owned()
    } else {
        parts.join("/")
    }
}
