use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Kind of content a page is indexed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Guides,
    Attributes,
    Classes,
    Entries,
    Categories,
    Files,
    Callbacks,
    Functions,
    Enums,
    Interfaces,
    Structures,
}

impl Category {
    /// Insertion order used when flattening into the lookup store.
    pub const ALL: [Category; 11] = [
        Category::Guides,
        Category::Attributes,
        Category::Classes,
        Category::Entries,
        Category::Categories,
        Category::Files,
        Category::Callbacks,
        Category::Functions,
        Category::Enums,
        Category::Interfaces,
        Category::Structures,
    ];

    /// Entry type label understood by documentation browsers.
    pub fn record_type(self) -> &'static str {
        match self {
            Category::Guides => "Guide",
            Category::Attributes => "Attribute",
            Category::Classes => "Class",
            Category::Entries => "Entry",
            Category::Categories => "Category",
            Category::Files => "File",
            Category::Callbacks => "Callback",
            Category::Functions => "Function",
            Category::Enums => "Enum",
            Category::Interfaces => "Interface",
            Category::Structures => "Structure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    /// Relative to the documents root, `/`-separated.
    pub path: String,
}

impl IndexEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Everything the crawl learned: categorized pages plus the raw TOC documents consulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentIndex {
    #[serde(default)]
    pub records: BTreeMap<Category, Vec<IndexEntry>>,
    #[serde(default)]
    pub toc: BTreeMap<String, serde_json::Value>,
}

impl ContentIndex {
    pub fn push(&mut self, category: Category, entry: IndexEntry) {
        self.records.entry(category).or_default().push(entry);
    }

    pub fn entries(&self, category: Category) -> &[IndexEntry] {
        self.records
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn merge(&mut self, other: ContentIndex) {
        for (category, entries) in other.records {
            self.records.entry(category).or_default().extend(entries);
        }
        self.toc.extend(other.toc);
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read content index: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse content index: {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        crate::fetch::ensure_parent_dir(path)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("create content index: {}", path.display()))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer(&mut out, self).context("serialize content index")?;
        out.flush().context("flush content index")?;
        Ok(())
    }
}

/// A theme stylesheet referenced by rewritten pages and still to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThemeResource {
    pub url: String,
    /// Destination relative to the documents root, `/`-separated.
    pub path: String,
}
