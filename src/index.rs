//! The `docSet.dsidx` lookup store read by documentation browsers.

use std::path::Path;

use anyhow::Context as _;
use rusqlite::{Connection, Transaction, params};

use crate::cli::IndexArgs;
use crate::formats::{Category, ContentIndex};

const SCHEMA_SQL: &str = "
CREATE TABLE searchIndex(id INTEGER PRIMARY KEY, name TEXT, type TEXT, path TEXT);
CREATE UNIQUE INDEX anchor ON searchIndex (name, type, path);
";

pub const INDEX_FILE_NAME: &str = "docSet.dsidx";

/// When a candidate record counts as already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Skip when any row shares the name or the path.
    #[default]
    NameOrPath,
    /// Skip only when the full `(name, type, path)` triple exists.
    Exact,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRecord {
    pub name: String,
    pub record_type: String,
    pub path: String,
}

impl DedupPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Exact } else { Self::NameOrPath }
    }
}

pub fn run(args: IndexArgs) -> anyhow::Result<()> {
    let content = ContentIndex::read(Path::new(&args.content_index))?;
    build_index(
        &content,
        Path::new(&args.out),
        DedupPolicy::from_strict(args.strict_dedup),
    )?;
    Ok(())
}

/// Recreates the lookup store at `db_path` from the content index.
pub fn build_index(
    content: &ContentIndex,
    db_path: &Path,
    policy: DedupPolicy,
) -> anyhow::Result<IndexReport> {
    if db_path.exists() {
        std::fs::remove_file(db_path)
            .with_context(|| format!("remove stale index: {}", db_path.display()))?;
    }
    crate::fetch::ensure_parent_dir(db_path)?;

    let mut connection = Connection::open(db_path)
        .with_context(|| format!("open index: {}", db_path.display()))?;
    connection
        .execute_batch(SCHEMA_SQL)
        .context("create searchIndex schema")?;

    let transaction = connection
        .transaction()
        .context("start index transaction")?;
    let mut report = IndexReport::default();
    for category in Category::ALL {
        let record_type = category.record_type();
        for entry in content.entries(category) {
            let path = entry.path.replace('\\', "/");
            if record_exists(&transaction, policy, &entry.name, record_type, &path)? {
                tracing::debug!(name = %entry.name, %path, "record exists");
                report.skipped += 1;
                continue;
            }
            transaction
                .execute(
                    "INSERT OR IGNORE INTO searchIndex(name, type, path) VALUES (?1, ?2, ?3)",
                    params![entry.name, record_type, path],
                )
                .with_context(|| format!("insert {} {}", record_type, entry.name))?;
            tracing::debug!(record_type, name = %entry.name, %path, "add record");
            report.inserted += 1;
        }
    }
    transaction.commit().context("commit index transaction")?;

    tracing::info!(
        db = %db_path.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "lookup store written"
    );
    Ok(report)
}

fn record_exists(
    transaction: &Transaction<'_>,
    policy: DedupPolicy,
    name: &str,
    record_type: &str,
    path: &str,
) -> anyhow::Result<bool> {
    let exists: i64 = match policy {
        DedupPolicy::NameOrPath => transaction.query_row(
            "SELECT EXISTS(SELECT 1 FROM searchIndex WHERE name = ?1 OR path = ?2)",
            params![name, path],
            |row| row.get::<_, i64>(0),
        ),
        DedupPolicy::Exact => transaction.query_row(
            "SELECT EXISTS(SELECT 1 FROM searchIndex WHERE name = ?1 AND type = ?2 AND path = ?3)",
            params![name, record_type, path],
            |row| row.get::<_, i64>(0),
        ),
    }
    .with_context(|| format!("look up record {name}"))?;
    Ok(exists == 1)
}

/// All rows of a lookup store, in insertion order.
pub fn read_records(db_path: &Path) -> anyhow::Result<Vec<LookupRecord>> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("open index: {}", db_path.display()))?;
    let mut statement = connection
        .prepare("SELECT name, type, path FROM searchIndex ORDER BY id ASC")
        .context("prepare searchIndex query")?;
    let rows = statement
        .query_map([], |row| {
            Ok(LookupRecord {
                name: row.get(0)?,
                record_type: row.get(1)?,
                path: row.get(2)?,
            })
        })
        .context("query searchIndex")?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.context("decode searchIndex row")?);
    }
    Ok(records)
}
