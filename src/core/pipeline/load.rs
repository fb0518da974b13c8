//! JSON-lines loader.
//!
//! Writes one `<file name>.jsonl` per source file, one object per row
//! keyed by header. Sources under the watch root keep their relative
//! directory inside the output directory, so `east/orders.csv` and
//! `west/orders.csv` never share a target or a staging file. The file
//! is staged under a temporary name and renamed into place, so readers
//! never observe a partial load and loading the same source twice
//! overwrites rather than appends.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::error::{PipeError, Result};
use crate::core::pipeline::stages::Loader;
use crate::core::types::Dataset;

#[derive(Debug, Clone)]
pub struct JsonLinesLoader {
    output_dir: PathBuf,
    source_root: Option<PathBuf>,
}

impl JsonLinesLoader {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            source_root: None,
        }
    }

    /// Mirror source paths relative to `root` instead of in full
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Destination for rows extracted from `source`
    ///
    /// Distinct source paths map to distinct targets. Sources outside
    /// the root keep their whole path below the output directory.
    pub fn target_for(&self, source: &Path) -> PathBuf {
        let relative = self
            .source_root
            .as_deref()
            .and_then(|root| source.strip_prefix(root).ok())
            .unwrap_or(source);

        let mut target = self.output_dir.clone();
        let mut named = false;
        for part in relative.components() {
            if let Component::Normal(part) = part {
                target.push(part);
                named = true;
            }
        }
        if !named {
            target.push("dataset");
        }

        let mut file_name = target.file_name().unwrap_or_default().to_os_string();
        file_name.push(".jsonl");
        target.set_file_name(file_name);
        target
    }
}

#[async_trait]
impl Loader for JsonLinesLoader {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn load(&self, data: &Dataset) -> Result<usize> {
        let target = self.target_for(&data.source);
        let data = data.clone();

        tokio::task::spawn_blocking(move || write_jsonl(&target, &data))
            .await
            .map_err(|e| PipeError::Load(format!("writer task failed: {e}")))?
    }
}

fn write_jsonl(target: &Path, data: &Dataset) -> Result<usize> {
    let fail = |e: &dyn std::fmt::Display| PipeError::Load(format!("{}: {e}", target.display()));

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| fail(&e))?;
    }

    let tmp = target.with_extension("jsonl.tmp");
    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for row in &data.rows {
            let record: Map<String, Value> = data
                .headers
                .iter()
                .zip(row)
                .map(|(h, v)| (h.clone(), Value::String(v.clone())))
                .collect();
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| PipeError::IoError(e.into_error()))?
            .sync_all()?;
        fs::rename(&tmp, target)?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(fail(&e));
    }

    Ok(data.len())
}
