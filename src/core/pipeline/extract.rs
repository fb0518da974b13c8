//! CSV extractor.
//!
//! Parsing runs on the blocking pool; a large file must not stall the
//! runtime threads that other workers share.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::error::{PipeError, Result};
use crate::core::pipeline::stages::Extractor;
use crate::core::types::Dataset;

/// Reads a headered CSV file into a [`Dataset`]
#[derive(Debug, Clone)]
pub struct CsvExtractor {
    delimiter: u8,
}

impl Default for CsvExtractor {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

#[async_trait]
impl Extractor for CsvExtractor {
    fn name(&self) -> &str {
        "csv"
    }

    async fn extract(&self, path: &Path) -> Result<Dataset> {
        let path = path.to_path_buf();
        let delimiter = self.delimiter;

        tokio::task::spawn_blocking(move || read_csv(path, delimiter))
            .await
            .map_err(|e| PipeError::Extract(format!("reader task failed: {e}")))?
    }
}

fn read_csv(path: PathBuf, delimiter: u8) -> Result<Dataset> {
    let file = File::open(&path)
        .map_err(|e| PipeError::Extract(format!("{}: {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .delimiter(delimiter)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipeError::Extract(format!("{}: {e}", path.display())))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(PipeError::Extract(format!(
            "{}: missing header row",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PipeError::Extract(format!("{}: {e}", path.display())))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    tracing::debug!(rows = rows.len(), columns = headers.len(), "Read {:?}", path);
    Ok(Dataset::new(path, headers, rows))
}
