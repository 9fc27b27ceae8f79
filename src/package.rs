use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use flate2::Compression;
use flate2::write::GzEncoder;
use walkdir::WalkDir;

use crate::config::SiteConfig;

const INFO_PLIST: &str = include_str!("../static/Info.plist");
const LICENSE: &str = include_str!("../static/DASH_LICENSE");
const ICON: &[u8] = include_bytes!("../static/icon.png");
const ICON_2X: &[u8] = include_bytes!("../static/icon@2x.png");

/// Folders of a `<name>.docset` bundle.
#[derive(Debug, Clone)]
pub struct DocsetLayout {
    pub docset_dir: PathBuf,
    pub contents_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub documents_dir: PathBuf,
}

impl DocsetLayout {
    pub fn new(parent: &Path, site: &SiteConfig) -> Self {
        let docset_dir = parent.join(format!("{}.docset", site.docset_name));
        let contents_dir = docset_dir.join("Contents");
        let resources_dir = contents_dir.join("Resources");
        let documents_dir = resources_dir.join("Documents");
        Self {
            docset_dir,
            contents_dir,
            resources_dir,
            documents_dir,
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.resources_dir.join(crate::index::INDEX_FILE_NAME)
    }
}

/// Writes the bundle metadata, license and icons.
pub fn install_static_assets(layout: &DocsetLayout) -> anyhow::Result<()> {
    std::fs::create_dir_all(&layout.resources_dir)
        .with_context(|| format!("create resources dir: {}", layout.resources_dir.display()))?;

    let assets: [(PathBuf, &[u8]); 4] = [
        (layout.contents_dir.join("Info.plist"), INFO_PLIST.as_bytes()),
        (layout.resources_dir.join("LICENSE"), LICENSE.as_bytes()),
        (layout.docset_dir.join("icon.png"), ICON),
        (layout.docset_dir.join("icon@2x.png"), ICON_2X),
    ];
    for (path, contents) in assets {
        std::fs::write(&path, contents)
            .with_context(|| format!("write static asset: {}", path.display()))?;
    }
    Ok(())
}

/// Packs `source_dir` into a gzip-compressed tar rooted at the folder's own name.
///
/// The archive is written next to `out_path` and renamed into place once complete.
pub fn make_archive(source_dir: &Path, out_path: &Path) -> anyhow::Result<()> {
    let root_name = source_dir
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("archive source has no name: {}", source_dir.display()))?;
    let out_dir = match out_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir: {}", out_dir.display()))?;

    let staging = tempfile::NamedTempFile::new_in(&out_dir)
        .with_context(|| format!("create staging archive in {}", out_dir.display()))?;
    let encoder = GzEncoder::new(
        staging
            .reopen()
            .context("open staging archive for writing")?,
        Compression::default(),
    );
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(root_name, source_dir)
        .with_context(|| format!("archive {}", source_dir.display()))?;
    let encoder = builder.into_inner().context("finish tar stream")?;
    encoder.finish().context("finish gzip stream")?;

    staging
        .persist(out_path)
        .with_context(|| format!("move archive into place: {}", out_path.display()))?;
    tracing::info!(archive = %out_path.display(), "docset archive written");
    Ok(())
}

/// Replaces `dst` with a fresh copy of `src`.
pub fn copy_folder(src: &Path, dst: &Path) -> anyhow::Result<()> {
    if dst.exists() {
        make_writable(dst)?;
        std::fs::remove_dir_all(dst).with_context(|| format!("remove {}", dst.display()))?;
    }
    merge_folders(src, dst)
}

/// Copies every file of `src` over the tree at `dst`, creating folders as needed.
pub fn merge_folders(src: &Path, dst: &Path) -> anyhow::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("walk {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("{} is not under {}", entry.path().display(), src.display()))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("create dir: {}", target.display()))?;
        } else {
            crate::fetch::ensure_parent_dir(&target)?;
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!("copy {} -> {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

fn make_writable(root: &Path) -> anyhow::Result<()> {
    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let metadata = entry
            .metadata()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            std::fs::set_permissions(entry.path(), permissions)
                .with_context(|| format!("make writable: {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Lists the entry paths of a `.tgz` archive.
pub fn archive_entries(archive_path: &Path) -> anyhow::Result<Vec<String>> {
    let file = File::open(archive_path)
        .with_context(|| format!("open archive: {}", archive_path.display()))?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut names = Vec::new();
    for entry in archive.entries().context("read archive entries")? {
        let entry = entry.context("read archive entry")?;
        let path = entry.path().context("decode archive entry path")?;
        names.push(path.to_string_lossy().replace('\\', "/"));
    }
    Ok(names)
}
