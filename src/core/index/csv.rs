//! CSV index format.

use super::{warn_dropped_columns, HashRow, IndexSchema, IMAGE_NAME, JOB_NUMBER, JOB_URL};
use crate::error::IndexError;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Column positions of one CSV header
struct ColumnMap {
    image_name: usize,
    job_number: usize,
    job_url: usize,
    hashes: Vec<(String, usize)>,
}

impl ColumnMap {
    fn from_headers(
        path: &Path,
        headers: &csv::StringRecord,
        schema: &IndexSchema,
    ) -> Result<Self, IndexError> {
        let position = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| IndexError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })
        };

        let hashes = schema
            .hash_columns()
            .iter()
            .filter_map(|c| headers.iter().position(|h| h == c).map(|i| (c.clone(), i)))
            .collect();

        Ok(Self {
            image_name: position(IMAGE_NAME)?,
            job_number: position(JOB_NUMBER)?,
            job_url: position(JOB_URL)?,
            hashes,
        })
    }

    fn parse_record(&self, record: &csv::StringRecord) -> HashRow {
        let cell = |i: usize| record.get(i).unwrap_or_default().to_string();

        let hashes: BTreeMap<String, String> = self
            .hashes
            .iter()
            .filter_map(|(name, i)| match record.get(*i) {
                Some(value) if !value.is_empty() => Some((name.clone(), value.to_string())),
                _ => None,
            })
            .collect();

        HashRow {
            image_name: cell(self.image_name),
            job_number: cell(self.job_number),
            job_url: cell(self.job_url),
            hashes,
        }
    }
}

/// Rows plus the header as stored in the file
pub(super) fn read_rows(
    path: &Path,
    schema: &IndexSchema,
) -> Result<(Vec<String>, Vec<HashRow>), IndexError> {
    let read_error = |e: csv::Error| IndexError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;

    let headers = reader.headers().map_err(read_error)?.clone();
    warn_dropped_columns(path, schema, headers.iter());
    let columns = ColumnMap::from_headers(path, &headers, schema)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_error)?;
        let row = columns.parse_record(&record);
        if !row.image_name.is_empty() {
            rows.push(row);
        }
    }

    Ok((headers.iter().map(String::from).collect(), rows))
}

pub(super) fn write_rows<'a>(
    file: &mut File,
    schema: &IndexSchema,
    rows: impl Iterator<Item = &'a HashRow>,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(schema.columns())
        .map_err(|e| e.to_string())?;

    for row in rows {
        let mut record = vec![
            row.image_name.as_str(),
            row.job_number.as_str(),
            row.job_url.as_str(),
        ];
        record.extend(
            schema
                .hash_columns()
                .iter()
                .map(|c| row.hashes.get(c).map(String::as_str).unwrap_or_default()),
        );
        writer.write_record(&record).map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())
}
