//! Parquet index format.
//!
//! Every column is Utf8. The three fixed columns are required; hash columns
//! are nullable so rows from a partial run can still be stored.

use super::{warn_dropped_columns, HashRow, IndexSchema, IMAGE_NAME, JOB_NUMBER, JOB_URL};
use crate::error::IndexError;
use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

fn arrow_schema(schema: &IndexSchema) -> Schema {
    let mut fields = vec![
        Field::new(IMAGE_NAME, DataType::Utf8, false),
        Field::new(JOB_NUMBER, DataType::Utf8, false),
        Field::new(JOB_URL, DataType::Utf8, false),
    ];
    fields.extend(
        schema
            .hash_columns()
            .iter()
            .map(|c| Field::new(c.as_str(), DataType::Utf8, true)),
    );
    Schema::new(fields)
}

fn to_record_batch<'a>(
    schema: &IndexSchema,
    rows: impl Iterator<Item = &'a HashRow>,
) -> Result<RecordBatch, String> {
    let rows: Vec<&HashRow> = rows.collect();

    let image_names: StringArray = rows.iter().map(|r| Some(r.image_name.as_str())).collect();
    let job_numbers: StringArray = rows.iter().map(|r| Some(r.job_number.as_str())).collect();
    let job_urls: StringArray = rows.iter().map(|r| Some(r.job_url.as_str())).collect();

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(image_names),
        Arc::new(job_numbers),
        Arc::new(job_urls),
    ];
    for column in schema.hash_columns() {
        let values: StringArray = rows
            .iter()
            .map(|r| r.hashes.get(column).map(String::as_str))
            .collect();
        columns.push(Arc::new(values));
    }

    RecordBatch::try_new(Arc::new(arrow_schema(schema)), columns)
        .map_err(|e| format!("failed to build record batch: {}", e))
}

pub(super) fn write_rows<'a>(
    file: &mut File,
    schema: &IndexSchema,
    rows: impl Iterator<Item = &'a HashRow>,
) -> Result<(), String> {
    let batch = to_record_batch(schema, rows)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| format!("failed to create parquet writer: {}", e))?;
    writer
        .write(&batch)
        .map_err(|e| format!("failed to write parquet batch: {}", e))?;
    writer
        .close()
        .map_err(|e| format!("failed to close parquet writer: {}", e))?;

    Ok(())
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Option<&'b StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

/// Rows plus the column names as stored in the file
pub(super) fn read_rows(
    path: &Path,
    schema: &IndexSchema,
) -> Result<(Vec<String>, Vec<HashRow>), IndexError> {
    let read_error = |reason: String| IndexError::Read {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| read_error(e.to_string()))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| read_error(e.to_string()))?;

    let file_schema = builder.schema().clone();
    warn_dropped_columns(
        path,
        schema,
        file_schema.fields().iter().map(|f| f.name().as_str()),
    );
    for column in [IMAGE_NAME, JOB_NUMBER, JOB_URL] {
        if file_schema.field_with_name(column).is_err() {
            return Err(IndexError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let reader = builder.build().map_err(|e| read_error(e.to_string()))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| read_error(e.to_string()))?;

        let fixed = (
            string_column(&batch, IMAGE_NAME),
            string_column(&batch, JOB_NUMBER),
            string_column(&batch, JOB_URL),
        );
        let (Some(names), Some(jobs), Some(urls)) = fixed else {
            return Err(read_error("fixed columns are not Utf8".to_string()));
        };

        let hash_arrays: Vec<(&String, &StringArray)> = schema
            .hash_columns()
            .iter()
            .filter_map(|c| string_column(&batch, c).map(|a| (c, a)))
            .collect();

        for i in 0..batch.num_rows() {
            if names.is_null(i) {
                continue;
            }

            let hashes: BTreeMap<String, String> = hash_arrays
                .iter()
                .filter(|(_, array)| !array.is_null(i))
                .map(|(name, array)| ((*name).clone(), array.value(i).to_string()))
                .collect();

            let text = |array: &StringArray| {
                if array.is_null(i) {
                    String::new()
                } else {
                    array.value(i).to_string()
                }
            };

            rows.push(HashRow {
                image_name: names.value(i).to_string(),
                job_number: text(jobs),
                job_url: text(urls),
                hashes,
            });
        }
    }

    let header = file_schema.fields().iter().map(|f| f.name().clone()).collect();
    Ok((header, rows))
}
