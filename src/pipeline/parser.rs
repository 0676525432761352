use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::{ParseMode, SourceConfig};
use crate::domain::RawTable;
use crate::error::{LoaderError, Result};

/// Delimited text with a header row into a `RawTable`.
#[derive(Debug, Clone)]
pub struct RecordParser {
    delimiter: u8,
    mode: ParseMode,
}

impl RecordParser {
    pub fn new(delimiter: u8, mode: ParseMode) -> Self {
        Self { delimiter, mode }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        // validated as ASCII at load time
        Self::new(config.delimiter as u8, config.parse_mode)
    }

    pub fn parse(&self, content: &str) -> Result<RawTable> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut records = reader.records();
        let header = loop {
            match records.next() {
                Some(rec) => {
                    let rec = rec.map_err(csv_error)?;
                    if !is_blank(&rec) {
                        break rec;
                    }
                }
                None => {
                    return Err(LoaderError::Parse(
                        "content is empty, no header row found".to_string(),
                    ))
                }
            }
        };

        let headers = parse_header(&header)?;
        let width = headers.len();
        let mut table = RawTable::new(headers);
        let mut adjusted = 0usize;

        for rec in records {
            let rec = rec.map_err(csv_error)?;
            if is_blank(&rec) {
                continue;
            }
            let mut row: Vec<String> = rec.iter().map(str::to_string).collect();
            if row.len() != width {
                match self.mode {
                    ParseMode::Strict => {
                        let line = rec.position().map(|p| p.line()).unwrap_or_default();
                        return Err(LoaderError::Parse(format!(
                            "line {}: expected {} fields, found {}",
                            line,
                            width,
                            row.len()
                        )));
                    }
                    ParseMode::Lenient => {
                        row.resize(width, String::new());
                        adjusted += 1;
                    }
                }
            }
            table.push_row(row);
        }

        if adjusted > 0 {
            warn!(adjusted, "Padded or truncated rows with a mismatched field count");
        }
        debug!(rows = table.len(), columns = ?table.headers(), "Parsed delimited content");
        Ok(table)
    }
}

fn parse_header(record: &csv::StringRecord) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut headers = Vec::with_capacity(record.len());
    for (idx, name) in record.iter().enumerate() {
        let name = name.trim();
        if name.is_empty() {
            return Err(LoaderError::Parse(format!("header column {} is empty", idx + 1)));
        }
        if !seen.insert(name.to_string()) {
            return Err(LoaderError::Parse(format!("duplicate header column '{}'", name)));
        }
        headers.push(name.to_string());
    }
    Ok(headers)
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty()) && record.len() <= 1
}

fn csv_error(err: csv::Error) -> LoaderError {
    LoaderError::Parse(err.to_string())
}
