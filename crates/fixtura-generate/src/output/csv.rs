use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use fixtura_core::Entity;
use serde_json::Value;

use crate::errors::GenerationError;
use crate::model::RelatedMode;

/// Write the records of one entity as CSV, one column per field in
/// declaration order. Relation columns are left out in [`RelatedMode::Omit`].
///
/// Lists are joined with `;`, nested objects are written as JSON and nulls
/// as empty cells.
pub fn write_entity_csv(
    path: &Path,
    entity: &Entity,
    records: &[Value],
    mode: RelatedMode,
) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    let columns: Vec<&str> = entity
        .fields()
        .filter(|(_, spec)| mode != RelatedMode::Omit || !spec.is_relation())
        .map(|(name, _)| name)
        .collect();
    writer.write_record(&columns)?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| record.get(column).map(csv_cell).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

/// Write one `<entity>.csv` file per entity into `dir`.
pub fn write_records_csv(
    dir: &Path,
    entities: &BTreeMap<String, std::sync::Arc<Entity>>,
    records: &BTreeMap<String, Vec<Value>>,
    mode: RelatedMode,
) -> Result<u64, GenerationError> {
    std::fs::create_dir_all(dir)?;
    let mut bytes = 0;
    for (name, entity) in entities {
        let rows = records.get(name).map(Vec::as_slice).unwrap_or_default();
        bytes += write_entity_csv(&dir.join(format!("{name}.csv")), entity, rows, mode)?;
    }
    Ok(bytes)
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(csv_cell).collect::<Vec<_>>().join(";"),
        other => other.to_string(),
    }
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
