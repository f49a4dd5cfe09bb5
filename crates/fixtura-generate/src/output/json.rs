use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use crate::errors::GenerationError;

/// Write all records as one pretty-printed JSON object keyed by entity.
pub fn write_records_json(
    path: &Path,
    records: &BTreeMap<String, Vec<Value>>,
) -> Result<u64, GenerationError> {
    let bytes = serde_json::to_vec_pretty(records)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(bytes.len() as u64 + 1)
}
