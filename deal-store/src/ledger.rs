use crate::csv::{parse_rows, push_row};
use dealwatch_core::{DealRecord, PersistenceError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Column order is part of the file format read by downstream reports.
pub const LEDGER_HEADER: [&str; 8] = [
    "highlight",
    "part",
    "created",
    "price",
    "title",
    "url",
    "subreddit",
    "flair",
];

/// The ledger file as it stood when read, for digest delivery.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub path: PathBuf,
    pub contents: Vec<u8>,
    pub row_count: usize,
}

impl LedgerSnapshot {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deals.csv".to_string())
    }

    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Append-only CSV record of every accepted deal.
#[derive(Debug, Clone)]
pub struct DealLedger {
    path: PathBuf,
}

impl DealLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `records` in order. The header is written only when the file is
    /// new or empty; existing rows are never touched. Returns rows written.
    pub async fn append(&self, records: &[DealRecord]) -> Result<usize, PersistenceError> {
        self.append_inner(records)
            .await
            .map_err(|source| PersistenceError::LedgerAppend {
                path: self.path.display().to_string(),
                source,
            })?;

        if !records.is_empty() {
            info!(
                "Appended {} deals to {}",
                records.len(),
                self.path.display()
            );
        }
        Ok(records.len())
    }

    async fn append_inner(&self, records: &[DealRecord]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let needs_header = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e),
        };

        let mut chunk = String::new();
        if needs_header {
            debug!("Creating ledger {} with header", self.path.display());
            push_row(&mut chunk, &LEDGER_HEADER);
        }
        for record in records {
            push_row(&mut chunk, &record_row(record));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(chunk.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    /// `None` when nothing has been recorded yet.
    pub async fn snapshot(&self) -> Result<Option<LedgerSnapshot>, PersistenceError> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.read_error(source)),
        };

        let row_count = data_rows(&String::from_utf8_lossy(&contents)).len();
        Ok(Some(LedgerSnapshot {
            path: self.path.clone(),
            contents,
            row_count,
        }))
    }

    /// Data rows (header excluded) in file order.
    pub async fn rows(&self) -> Result<Vec<Vec<String>>, PersistenceError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(data_rows(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(self.read_error(source)),
        }
    }

    fn read_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::LedgerRead {
            path: self.path.display().to_string(),
            source,
        }
    }
}

fn record_row(record: &DealRecord) -> [&str; 8] {
    [
        record.highlight_label(),
        &record.category,
        &record.created,
        &record.price,
        &record.title,
        &record.url,
        &record.source,
        &record.flair,
    ]
}

fn data_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = parse_rows(text);
    if rows
        .first()
        .is_some_and(|first| first.first().map(String::as_str) == Some(LEDGER_HEADER[0]))
    {
        rows.remove(0);
    }
    rows
}
