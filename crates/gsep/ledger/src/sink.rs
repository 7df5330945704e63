//! Persistence sinks for committed records.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::entry::LedgerRecord;
use crate::error::{LedgerError, LedgerResult};

/// Durable storage for ledger records.
///
/// `persist` runs before a record becomes visible in memory; an error aborts
/// the append.
pub trait LedgerSink: Send + Sync {
    fn persist(&self, record: &LedgerRecord) -> LedgerResult<()>;
}

/// Append-only journal, one JSON record per line.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "ledger journal opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record of a journal. A missing file is an empty journal.
    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Vec<LedgerRecord>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| {
                LedgerError::Serialization(format!(
                    "{} line {}: {e}",
                    path.display(),
                    index + 1
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl LedgerSink for JsonLinesSink {
    fn persist(&self, record: &LedgerRecord) -> LedgerResult<()> {
        let mut line =
            serde_json::to_string(record).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| LedgerError::Backend("journal lock poisoned".to_string()))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}
