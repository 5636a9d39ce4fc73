//! Batch row parsing and writing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::BatchError;

/// Header names accepted for the item-reference column, in priority order.
const IMAGE_COLUMNS: &[&str] = &["images", "image_urls", "image_url", "url"];

/// One product row of a batch file.
///
/// `images` holds the raw reference list as produced upstream: a single URL
/// or several separated by `,` or `;`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRow {
    pub title: String,
    pub description: String,
    pub body: String,
    pub attributes: String,
    pub images: String,
    pub category: String,
}

impl BatchRow {
    /// Split the raw image reference list. The separator is `;` when
    /// present, `,` otherwise (both occur in the wild).
    pub fn image_urls(&self) -> Vec<String> {
        let sep = if self.images.contains(';') { ';' } else { ',' };
        self.images
            .split(sep)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The first image reference, if any.
    pub fn primary_image(&self) -> Option<String> {
        self.image_urls().into_iter().next()
    }
}

/// Sniff the field delimiter from a header line: `;` wins when present.
pub fn sniff_delimiter(header: &str) -> u8 {
    if header.contains(';') {
        b';'
    } else {
        b','
    }
}

/// Read all rows of a batch file.
///
/// The header must contain an item-reference column; other recognized
/// columns are optional and default to empty. Unrecognized columns are
/// ignored.
pub fn read_batch(path: &Path) -> Result<Vec<BatchRow>, BatchError> {
    let header = {
        let file = File::open(path)?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line)?;
        line
    };
    let delimiter = sniff_delimiter(&header);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| BatchError::Parse(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| BatchError::Parse(e.to_string()))?
        .clone();

    let find = |names: &[&str]| -> Option<usize> {
        names.iter().find_map(|name| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        })
    };

    let images_idx = find(IMAGE_COLUMNS)
        .ok_or_else(|| BatchError::MissingColumn("images".to_string()))?;
    let title_idx = find(&["title", "name"]);
    let description_idx = find(&["description"]);
    let body_idx = find(&["body"]);
    let attributes_idx = find(&["attributes"]);
    let category_idx = find(&["category"]);

    let get = |record: &csv::StringRecord, idx: Option<usize>| -> String {
        idx.and_then(|i| record.get(i))
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BatchError::Parse(e.to_string()))?;
        rows.push(BatchRow {
            title: get(&record, title_idx),
            description: get(&record, description_idx),
            body: get(&record, body_idx),
            attributes: get(&record, attributes_idx),
            images: get(&record, Some(images_idx)),
            category: get(&record, category_idx),
        });
    }

    Ok(rows)
}

/// Write rows as a batch file with the canonical `;` delimiter.
pub fn write_batch(path: &Path, rows: &[BatchRow]) -> Result<(), BatchError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(|e| BatchError::Parse(e.to_string()))?;

    writer
        .write_record(["title", "description", "body", "attributes", "images", "category"])
        .map_err(|e| BatchError::Parse(e.to_string()))?;

    for row in rows {
        writer
            .write_record([
                &row.title,
                &row.description,
                &row.body,
                &row.attributes,
                &row.images,
                &row.category,
            ])
            .map_err(|e| BatchError::Parse(e.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}

/// Every image reference of every row, in row order.
///
/// References are returned raw; normalization and malformed-URL skipping
/// happen at scheduling time.
pub fn extract_urls(rows: &[BatchRow]) -> Vec<String> {
    rows.iter().flat_map(|row| row.image_urls()).collect()
}
