use std::collections::HashMap;
use std::io::{Cursor, Write as _};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use msdn_docset::formats::{Category, ContentIndex, IndexEntry};
use predicates::prelude::*;

const STYLESHEET_PATH: &str = "/_themes/docs.theme/master/en-us/_themes/styles/site.css";

fn zip_archive(files: &[&str]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for name in files {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(b"---\ntitle: source\n---\n").expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

fn page(title: &str, body: &str) -> Vec<u8> {
    format!(
        r#"<!doctype html><html><head><title>{title}</title><link rel="stylesheet" href="{STYLESHEET_PATH}"><script src="/x.js"></script></head><body><h1>{title}</h1>{body}</body></html>"#
    )
    .into_bytes()
}

fn site_routes() -> HashMap<String, Vec<u8>> {
    let mut routes = HashMap::new();
    routes.insert(
        "/win32.zip".to_owned(),
        zip_archive(&[
            "win32-docs/desktop-src/desktop-app-technologies.md",
            "win32-docs/desktop-src/shell/about-the-shell.md",
        ]),
    );
    routes.insert(
        "/sdk-api.zip".to_owned(),
        zip_archive(&["sdk-api-docs/sdk-api-src/content/fileapi/nf-fileapi-createfilew.md"]),
    );
    routes.insert(STYLESHEET_PATH.to_owned(), b"body { margin: 0; }".to_vec());

    let docs = "/en-us/windows/win32";
    routes.insert(
        format!("{docs}/desktop-app-technologies"),
        page("Desktop App Technologies", ""),
    );
    routes.insert(
        format!("{docs}/shell/about-the-shell"),
        page(
            "About the Shell",
            r#"<a data-linktype="absolute-path" href="/en-us/windows/win32/api/fileapi/nf-fileapi-createfilew">CreateFileW</a>"#,
        ),
    );
    routes.insert(
        format!("{docs}/shell/toc.json"),
        br#"{"items":[{"href":"about-the-shell","toc_title":"Windows Shell"}]}"#.to_vec(),
    );
    routes.insert(format!("{docs}/api/fileapi"), page("fileapi.h", ""));
    routes.insert(
        format!("{docs}/api/fileapi/toc.json"),
        br#"{"items":[{"href":"/windows/win32/api/fileapi/","toc_title":"Fileapi.h header","children":[
            {"href":"/windows/win32/api/fileapi/nf-fileapi-createfilew","toc_title":"CreateFileW function"}]}]}"#
            .to_vec(),
    );
    routes.insert(
        format!("{docs}/api/fileapi/nf-fileapi-createfilew"),
        page("CreateFileW", ""),
    );
    routes
}

fn spawn_site_server(
    routes: HashMap<String, Vec<u8>>,
) -> (String, mpsc::Sender<()>, thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let base_url = format!("http://{}", server.server_addr());
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };
            let response = match routes.get(request.url()) {
                Some(body) => tiny_http::Response::from_data(body.clone()),
                None => tiny_http::Response::from_data(b"not found".to_vec()).with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });

    (base_url, shutdown_tx, handle)
}

#[test]
fn create_docset_builds_archive_end_to_end() {
    let (base_url, shutdown_tx, handle) = spawn_site_server(site_routes());
    let temp = tempfile::TempDir::new().expect("tempdir");
    let build_dir = temp.path().join("build");
    let output = temp.path().join("out").join("MSDN.tgz");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("msdn-docset");
    cmd.env_remove("RUST_LOG")
        .env("MSDN_DOCSET_BASE_URL", &base_url)
        .env("MSDN_DOCSET_WIN32_SOURCE_URL", format!("{base_url}/win32.zip"))
        .env("MSDN_DOCSET_SDK_API_SOURCE_URL", format!("{base_url}/sdk-api.zip"))
        .env("MSDN_DOCSET_MAX_RETRIES", "0")
        .env("MSDN_DOCSET_CONNECT_RETRY_MS", "1")
        .args(["create-docset", "--build-dir"])
        .arg(&build_dir)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("[5] package docset"));

    shutdown_tx.send(()).expect("shutdown");
    handle.join().expect("join server");

    let entries = msdn_docset::package::archive_entries(&output).expect("read archive");
    for expected in [
        "MSDN.docset/icon.png",
        "MSDN.docset/Contents/Info.plist",
        "MSDN.docset/Contents/Resources/docSet.dsidx",
        "MSDN.docset/Contents/Resources/Documents/docs.microsoft.com/win32/index.html",
        "MSDN.docset/Contents/Resources/Documents/docs.microsoft.com/win32/shell/about-the-shell.html",
        "MSDN.docset/Contents/Resources/Documents/docs.microsoft.com/_themes/docs.theme/master/en-us/_themes/styles/site.css",
        "MSDN.docset/Contents/Resources/Documents/docs.microsoft.com/en-us/windows/win32/api/fileapi/nf-fileapi-createfilew.html",
    ] {
        assert!(
            entries.iter().any(|e| e == expected),
            "missing {expected} in {entries:?}"
        );
    }

    let documents = build_dir.join("_4_ready_to_be_packaged/MSDN.docset/Contents/Resources");
    let records = msdn_docset::index::read_records(&documents.join("docSet.dsidx")).expect("records");
    let summary: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.record_type.as_str(), r.name.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Guide", "Windows Shell"),
            ("File", "Fileapi.h header"),
            ("Function", "CreateFileW function"),
        ]
    );

    let shell_page = std::fs::read_to_string(
        documents.join("Documents/docs.microsoft.com/win32/shell/about-the-shell.html"),
    )
    .expect("read shell page");
    assert!(shell_page.contains(
        r#"href="../../en-us/windows/win32/api/fileapi/nf-fileapi-createfilew.html""#
    ));
    assert!(shell_page.contains(
        r#"href="../../_themes/docs.theme/master/en-us/_themes/styles/site.css""#
    ));
    assert!(!shell_page.contains("x.js"));

    let snapshot = ContentIndex::read(&build_dir.join("_1_downloaded_contents/toc.json"))
        .expect("content index snapshot");
    assert_eq!(snapshot.entries(Category::Entries).len(), 1);
}

#[test]
fn rewrite_html_writes_rewritten_page() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let root = temp.path().join("docs");
    let input = root.join("docs.microsoft.com/win32/shell/about.html");
    std::fs::create_dir_all(input.parent().expect("parent")).expect("create dirs");
    std::fs::write(
        &input,
        r#"<html><head><script>x()</script></head><body><a data-linktype="relative-path" href="./ui/">UI</a></body></html>"#,
    )
    .expect("write input");
    let output = temp.path().join("out.html");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("msdn-docset");
    cmd.arg("rewrite-html")
        .arg(&input)
        .arg(&output)
        .arg(&root)
        .assert()
        .success();

    let html = std::fs::read_to_string(&output).expect("read output");
    assert!(html.contains(r#"href="./ui/index.html""#));
    assert!(!html.contains("<script>"));
}

#[test]
fn rewrite_html_rejects_page_outside_root() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let root = temp.path().join("docs");
    std::fs::create_dir_all(&root).expect("create root");
    let input = temp.path().join("elsewhere.html");
    std::fs::write(&input, "<html></html>").expect("write input");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("msdn-docset");
    cmd.arg("rewrite-html")
        .arg(&input)
        .arg(temp.path().join("out.html"))
        .arg(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not under documents root"));
}

#[test]
fn index_command_builds_lookup_store() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let snapshot = temp.path().join("toc.json");
    let mut content = ContentIndex::default();
    content.push(Category::Guides, IndexEntry::new("Shell", "a/shell.html"));
    content.push(Category::Entries, IndexEntry::new("Shell", "a/shell.html"));
    content.write(&snapshot).expect("write snapshot");
    let db = temp.path().join("docSet.dsidx");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("msdn-docset");
    cmd.args(["index", "--strict-dedup", "--content-index"])
        .arg(&snapshot)
        .arg("--out")
        .arg(&db)
        .assert()
        .success();

    let records = msdn_docset::index::read_records(&db).expect("records");
    assert_eq!(records.len(), 2);
}

#[test]
fn verbose_emits_debug_logs() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let snapshot = temp.path().join("toc.json");
    ContentIndex::default().write(&snapshot).expect("write snapshot");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("msdn-docset");
    cmd.env_remove("RUST_LOG")
        .args(["-v", "index", "--content-index"])
        .arg(&snapshot)
        .arg("--out")
        .arg(temp.path().join("docSet.dsidx"))
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}

#[cfg(not(feature = "browser"))]
#[test]
fn browser_page_source_needs_feature() {
    let temp = tempfile::TempDir::new().expect("tempdir");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("msdn-docset");
    cmd.args(["create-docset", "--page-source", "browser", "--build-dir"])
        .arg(temp.path().join("build"))
        .arg("--output")
        .arg(temp.path().join("MSDN.tgz"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("browser"));
}
