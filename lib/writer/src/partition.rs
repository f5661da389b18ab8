//! Partitioner: derives a partition directory from the configured partition
//! columns and strips those fields from the record before it reaches the
//! writer.
//!
//! Columns are configurable dotted paths rather than a single fixed field,
//! so this derives and strips an ordered list of keys, erroring per field
//! on anything missing, null, or non-string.

use std::path::PathBuf;

use rotor_model::{ColumnPath, Record, SchemaDef, Value};

use crate::error::WriterError;

/// Extracts the configured partition columns from a record, in
/// configuration order.
pub struct Partitioner {
    columns: Vec<ColumnPath>,
}

impl Partitioner {
    pub fn new(columns: Vec<ColumnPath>) -> Self {
        Partitioner { columns }
    }

    pub fn columns(&self) -> &[ColumnPath] {
        &self.columns
    }

    /// Returns `base` joined with one `field=value` segment per configured
    /// column, in order, and the record with every partition field
    /// removed (parent groups emptied by the removal are dropped too, per
    /// [`Record::remove`]).
    pub fn partition(&self, base: &PathBuf, mut record: Record) -> Result<(PathBuf, Record), WriterError> {
        let mut dir = base.clone();
        for path in &self.columns {
            let (value, remaining) = record.remove(path)?;
            record = remaining;

            let value = value.ok_or_else(|| WriterError::BadPartition(format!("missing field '{path}'")))?;
            let segment = match value {
                Value::Null => return Err(WriterError::BadPartition(format!("null field '{path}'"))),
                Value::Binary(bytes) => String::from_utf8(bytes)
                    .map_err(|_| WriterError::BadPartition(format!("non-string field '{path}'")))?,
                _ => return Err(WriterError::BadPartition(format!("non-string field '{path}'"))),
            };

            dir.push(format!("{path}={segment}"));
        }
        Ok((dir, record))
    }

    /// Applies the same field-stripping [`Partitioner::partition`] does to a
    /// record, but to a schema instead — used once at pipeline start so the
    /// "non-empty after partition removal" invariant is caught before the
    /// first write rather than discovered lazily column-by-column.
    pub fn strip_schema(&self, schema: &SchemaDef) -> Result<SchemaDef, WriterError> {
        let mut result = schema.clone();
        for path in &self.columns {
            result = remove_schema_path(&result, path)
                .ok_or_else(|| WriterError::SchemaResolution(format!("missing field '{path}'")))?;
        }
        match &result {
            SchemaDef::Group { fields, .. } if fields.is_empty() => Err(WriterError::SchemaResolution(
                "schema has no fields remaining after partition removal".to_string(),
            )),
            _ => Ok(result),
        }
    }
}

/// Schema-level counterpart of [`Record::remove`]: descends `path` through
/// nested groups, drops the named field, and drops the enclosing group too
/// if that removal empties it. Returns `None` if `schema` is not a group or
/// the head field does not exist.
fn remove_schema_path(schema: &SchemaDef, path: &ColumnPath) -> Option<SchemaDef> {
    let SchemaDef::Group { fields, required, metadata } = schema else {
        return None;
    };
    let head = path.head();
    let tail = path.tail();
    let idx = fields.iter().position(|(name, _)| name == head)?;

    let mut fields = fields.clone();
    if tail.is_empty() {
        fields.remove(idx);
    } else {
        let child = remove_schema_path(&fields[idx].1, &tail)?;
        match &child {
            SchemaDef::Group { fields: child_fields, .. } if child_fields.is_empty() => {
                fields.remove(idx);
            }
            _ => fields[idx].1 = child,
        }
    }
    Some(SchemaDef::Group {
        fields,
        required: *required,
        metadata: metadata.clone(),
    })
}
