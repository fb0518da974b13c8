//! Configuration-driven row cleaning.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::core::config::TransformConfig;
use crate::core::error::{PipeError, Result};
use crate::core::pipeline::stages::Transformer;
use crate::core::types::Dataset;

/// Generic cleaning transformer
///
/// Applied in order: trim, drop empty rows, drop rows missing a
/// required value, keep the first row per dedup key, allow-list
/// filter. Every configured column must exist in the header, otherwise
/// the stage fails.
#[derive(Debug, Clone, Default)]
pub struct CleaningTransformer {
    config: TransformConfig,
}

/// Row counts removed by each rule, for logging
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleaningReport {
    pub input: usize,
    pub empty: usize,
    pub incomplete: usize,
    pub duplicate: usize,
    pub filtered: usize,
}

impl CleaningReport {
    pub fn kept(&self) -> usize {
        self.input - self.empty - self.incomplete - self.duplicate - self.filtered
    }
}

impl CleaningTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    /// Apply all rules synchronously
    pub fn clean(&self, mut data: Dataset) -> Result<(Dataset, CleaningReport)> {
        let mut report = CleaningReport {
            input: data.len(),
            ..Default::default()
        };

        if self.config.trim_whitespace {
            trim_all(&mut data);
        }

        let required = self.columns(&data, &self.config.required_columns)?;
        let keys = self.columns(&data, &self.config.dedup_keys)?;
        let filter = match &self.config.filter_column {
            Some(column) => Some(self.column(&data, column)?),
            None => None,
        };
        let allowed: HashSet<&str> = self.config.allowed_values.iter().map(String::as_str).collect();

        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let rows = std::mem::take(&mut data.rows);
        for row in rows {
            if self.config.drop_empty_rows && row.iter().all(|f| f.is_empty()) {
                report.empty += 1;
                continue;
            }

            if required.iter().any(|&i| field(&row, i).is_empty()) {
                report.incomplete += 1;
                continue;
            }

            if !keys.is_empty() {
                let key: Vec<String> = keys.iter().map(|&i| field(&row, i).to_string()).collect();
                if !seen.insert(key) {
                    report.duplicate += 1;
                    continue;
                }
            }

            if let Some(i) = filter {
                if !allowed.contains(field(&row, i)) {
                    report.filtered += 1;
                    continue;
                }
            }

            data.rows.push(row);
        }

        Ok((data, report))
    }

    fn columns(&self, data: &Dataset, names: &[String]) -> Result<Vec<usize>> {
        names.iter().map(|name| self.column(data, name)).collect()
    }

    fn column(&self, data: &Dataset, name: &str) -> Result<usize> {
        data.column_index(name).ok_or_else(|| {
            PipeError::Transform(format!(
                "{}: missing column '{name}'",
                data.source.display()
            ))
        })
    }
}

// Short rows from lenient extractors read as empty fields
fn field(row: &[String], i: usize) -> &str {
    row.get(i).map(String::as_str).unwrap_or("")
}

fn trim_all(data: &mut Dataset) {
    for header in &mut data.headers {
        *header = header.trim().to_string();
    }
    for row in &mut data.rows {
        for field in row.iter_mut() {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
    }
}

#[async_trait]
impl Transformer for CleaningTransformer {
    fn name(&self) -> &str {
        "cleaning"
    }

    async fn transform(&self, data: Dataset) -> Result<Dataset> {
        let source = data.source.clone();
        let (data, report) = self.clean(data)?;

        tracing::debug!(
            input = report.input,
            kept = report.kept(),
            empty = report.empty,
            incomplete = report.incomplete,
            duplicate = report.duplicate,
            filtered = report.filtered,
            "Cleaned {:?}",
            source
        );
        Ok(data)
    }
}
