use std::path::{Path, PathBuf};

use msdn_docset::config::SiteConfig;
use msdn_docset::rewrite::{rewrite_document, rewrite_tree};
use scraper::{Html, Selector};

const INTERFACE_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <title>IShellFolder</title>
  <link rel="stylesheet" href="/_themes/docs.theme/master/en-us/_themes/styles/site.css">
  <link rel="stylesheet" href="https://cdn.example.com/fonts.css">
  <script src="/_themes/docs.theme/master/en-us/_themes/scripts/docs.js"></script>
</head>
<body>
  <div class="header-holder">site header</div>
  <ul class="breadcrumbs" role="navigation"><li>Docs</li></ul>
  <nav class="doc-outline" role="navigation">outline</nav>
  <main>
    <h1>IShellFolder interface</h1>
    <a id="method" data-linktype="relative-path" href="nf-shobjidl-ishellfolder-bindtoobject">BindToObject</a>
    <a id="folder" data-linktype="relative-path" href="./shell-folders/">Folders</a>
    <a id="api" data-linktype="absolute-path" href="/en-us/windows/win32/api/activation/nn-activation-iactivationfactory">IActivationFactory</a>
    <a id="legacy" data-linktype="absolute-path" href="/en-us/windows/desktop/api/FileAPI/nf-fileapi-createfilew#remarks">CreateFileW</a>
    <a id="other-site" data-linktype="absolute-path" href="/en-us/azure/overview">Azure</a>
    <a id="external" data-linktype="external" href="https://example.com/page">Example</a>
    <a id="anchor" data-linktype="self-bookmark" href="#methods">Methods</a>
    <a id="in-page" data-linktype="relative-path" href="#see-also">See also</a>
    <a id="own-header" data-linktype="absolute-path" href="/en-us/windows/win32/api/shobjidl">shobjidl.h</a>
    <script id="inline">var keep = true;</script>
  </main>
  <div class="binary-rating-holder">Was this page helpful?</div>
  <footer id="footer" data-bi-name="footer">footer</footer>
</body>
</html>
"##;

fn write_interface_page(root: &Path) -> PathBuf {
    let page = root.join("docs.microsoft.com/en-us/windows/win32/api/shobjidl/nn-shobjidl-ishellfolder.html");
    std::fs::create_dir_all(page.parent().expect("parent")).expect("create page dir");
    std::fs::write(&page, INTERFACE_PAGE).expect("write page");
    page
}

fn href(doc: &Html, id: &str) -> String {
    let selector = Selector::parse(&format!("a#{id}")).expect("selector");
    doc.select(&selector)
        .next()
        .unwrap_or_else(|| panic!("link {id} present"))
        .value()
        .attr("href")
        .expect("href")
        .to_owned()
}

fn count(doc: &Html, selector: &str) -> usize {
    doc.select(&Selector::parse(selector).expect("selector")).count()
}

#[test]
fn navigation_links_point_at_local_pages() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let page = write_interface_page(temp.path());

    let rewritten = rewrite_document(INTERFACE_PAGE, &page, temp.path(), &SiteConfig::default())
        .expect("rewrite");
    let doc = Html::parse_document(&rewritten.html);

    assert_eq!(href(&doc, "method"), "nf-shobjidl-ishellfolder-bindtoobject.html");
    assert_eq!(href(&doc, "folder"), "./shell-folders/index.html");
    assert_eq!(
        href(&doc, "api"),
        "../activation/nn-activation-iactivationfactory.html"
    );
    assert_eq!(
        href(&doc, "legacy"),
        "../fileapi/nf-fileapi-createfilew.html#remarks"
    );
    assert_eq!(
        href(&doc, "other-site"),
        "https://docs.microsoft.com/en-us/azure/overview"
    );
    assert_eq!(href(&doc, "external"), "https://example.com/page");
    assert_eq!(href(&doc, "anchor"), "#methods");
    assert_eq!(href(&doc, "in-page"), "#see-also");
    assert_eq!(href(&doc, "own-header"), "index.html");
    assert_eq!(count(&doc, r#"a#api[data-linktype="relative-path"]"#), 1);
}

#[test]
fn site_chrome_and_head_scripts_are_removed() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let page = write_interface_page(temp.path());

    let rewritten = rewrite_document(INTERFACE_PAGE, &page, temp.path(), &SiteConfig::default())
        .expect("rewrite");
    let doc = Html::parse_document(&rewritten.html);

    assert_eq!(count(&doc, "div.header-holder"), 0);
    assert_eq!(count(&doc, "ul.breadcrumbs"), 0);
    assert_eq!(count(&doc, "nav.doc-outline"), 0);
    assert_eq!(count(&doc, "div.binary-rating-holder"), 0);
    assert_eq!(count(&doc, "footer#footer"), 0);
    assert_eq!(count(&doc, "head script"), 0);
    assert_eq!(count(&doc, "script#inline"), 1);
    assert_eq!(count(&doc, "main h1"), 1);
}

#[test]
fn theme_stylesheets_are_localized_and_collected() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let page = write_interface_page(temp.path());

    let rewritten = rewrite_document(INTERFACE_PAGE, &page, temp.path(), &SiteConfig::default())
        .expect("rewrite");
    let doc = Html::parse_document(&rewritten.html);

    let stylesheets: Vec<&str> = doc
        .select(&Selector::parse(r#"link[rel="stylesheet"]"#).expect("selector"))
        .filter_map(|el| el.value().attr("href"))
        .collect();
    assert_eq!(
        stylesheets,
        vec![
            "../../../../../_themes/docs.theme/master/en-us/_themes/styles/site.css",
            "https://cdn.example.com/fonts.css",
        ]
    );

    assert_eq!(rewritten.resources.len(), 1);
    let resource = rewritten.resources.iter().next().expect("resource");
    assert_eq!(
        resource.url,
        "https://docs.microsoft.com/_themes/docs.theme/master/en-us/_themes/styles/site.css"
    );
    assert_eq!(
        resource.path,
        "docs.microsoft.com/_themes/docs.theme/master/en-us/_themes/styles/site.css"
    );
}

#[test]
fn rewriting_a_tree_twice_is_a_no_op() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let page = write_interface_page(temp.path());
    let site = SiteConfig::default();

    let resources = rewrite_tree(temp.path(), &site).expect("first pass");
    assert_eq!(resources.len(), 1);
    let first = std::fs::read_to_string(&page).expect("read first pass");

    let resources = rewrite_tree(temp.path(), &site).expect("second pass");
    assert!(resources.is_empty());
    let second = std::fs::read_to_string(&page).expect("read second pass");

    assert_eq!(first, second);
}
