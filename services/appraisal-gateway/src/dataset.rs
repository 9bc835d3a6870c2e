//! Append-only CSV dataset of labeled apartments, consumed by the model service on retrain.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::metrics::DATASET_ROWS_APPENDED;

/// Column order is part of the on-disk contract. Changing it requires migrating every row.
pub const HEADER: &str = "price,bedrooms,bathrooms,sqm,city";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentRecord {
    #[serde(alias = "priceAZN")]
    pub price_local_currency: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub sqm: f64,
    pub city: String,
}

impl ApartmentRecord {
    /// One CSV row without the trailing newline. `f64` display never uses locale
    /// separators or exponent notation.
    pub fn to_csv_row(&self) -> Result<String, DatasetError> {
        let numeric = [
            ("price", self.price_local_currency),
            ("bedrooms", self.bedrooms),
            ("bathrooms", self.bathrooms),
            ("sqm", self.sqm),
        ];
        if let Some(&(field, _)) = numeric.iter().find(|(_, v)| !v.is_finite()) {
            return Err(DatasetError::NonFinite(field));
        }
        Ok(format!(
            "{},{},{},{},{}",
            self.price_local_currency,
            self.bedrooms,
            self.bathrooms,
            self.sqm,
            quote_field(&self.city)
        ))
    }
}

/// Line breaks become spaces so a row is always one physical line; commas and
/// quotes are handled with standard CSV quoting.
fn quote_field(raw: &str) -> String {
    let flat: String = raw.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }).collect();
    if flat.contains([',', '"']) {
        format!("\"{}\"", flat.replace('"', "\"\""))
    } else {
        flat
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset writer task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("field `{0}` is not a finite number")]
    NonFinite(&'static str),
}

/// Single-writer handle to the dataset file. Clones share the same lock.
#[derive(Clone, Debug)]
pub struct DatasetStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Arc::new(Mutex::new(())) }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Appends one row, writing the header first if the file is new or empty.
    /// Either the whole write lands or the file is left at its previous length.
    pub async fn append(&self, record: &ApartmentRecord) -> Result<(), DatasetError> {
        let row = record.to_csv_row()?;
        let path = self.path.clone();
        let lock = Arc::clone(&self.write_lock);
        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock();
            append_row(&path, &row)
        })
        .await??;
        DATASET_ROWS_APPENDED.inc();
        Ok(())
    }
}

fn append_row(path: &Path, row: &str) -> Result<(), DatasetError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = OpenOptions::new().read(true).create(true).append(true).open(path)?;
    let prior_len = file.metadata()?.len();

    let mut buf = String::with_capacity(HEADER.len() + row.len() + 3);
    if prior_len == 0 {
        buf.push_str(HEADER);
        buf.push('\n');
    } else if !ends_with_newline(&mut file)? {
        buf.push('\n');
    }
    buf.push_str(row);
    buf.push('\n');

    if let Err(e) = file.write_all(buf.as_bytes()).and_then(|_| file.sync_data()) {
        roll_back(&file, prior_len, path);
        return Err(e.into());
    }
    debug!(path = %path.display(), header_written = prior_len == 0, "dataset row appended");
    Ok(())
}

/// Truncates to the pre-write length. Returns false, after logging, if the partial
/// row could not be removed.
fn roll_back(file: &std::fs::File, prior_len: u64, path: &Path) -> bool {
    match file.set_len(prior_len) {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, path = %path.display(), prior_len, "dataset rollback failed, partial row left on disk");
            false
        }
    }
}

/// Writes on an append handle always go to the end, so moving the cursor here is harmless.
fn ends_with_newline(file: &mut std::fs::File) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
