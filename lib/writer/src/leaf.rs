//! Leaf-column flattening and row shredding.
//!
//! Walks a materialized [`SchemaDef`] to a flat, ordered list of leaf
//! columns, then shreds buffered [`Record`]s into per-column
//! value/definition-level/repetition-level vectors for a single row group,
//! driving `parquet`'s low-level `SerializedFileWriter` one column at a
//! time — the same column-at-a-time shape as a cursor-to-Parquet dump, just
//! fed from in-memory records instead of a database cursor.
//!
//! List and map leaves shred to one level of repetition (a list of
//! primitives/groups, or a map of primitive keys to primitive/group
//! values); a repeated element that is itself a list or map is not
//! supported.

use parquet::column::writer::ColumnWriter;
use parquet::data_type::{ByteArray, FixedLenByteArray, Int96};
use parquet::file::writer::SerializedFileWriter;

use rotor_model::{Record, SchemaDef, Value};

use crate::error::WriterError;

#[derive(Debug, Clone)]
enum Step {
    /// Descend into a named field of a group. `optional` is the *child*
    /// schema's own repetition, i.e. whether finding this field contributes
    /// a definition level.
    Field { name: String, optional: bool },
    ListElement,
    MapKey,
    MapValue,
}

/// One leaf column's read path through a [`Record`], plus the definition
/// and repetition level it tops out at.
#[derive(Debug, Clone)]
pub struct LeafColumn {
    steps: Vec<Step>,
    physical_type: parquet::basic::Type,
    max_def_level: i16,
    max_rep_level: i16,
}

/// Walks `schema` to a flat, ordered list of leaf columns, in the same
/// order [`SchemaDef::materialize`] emits fields — this order must match
/// the row group's column order.
pub fn flatten(schema: &SchemaDef) -> Vec<LeafColumn> {
    let mut out = Vec::new();
    walk(schema, Vec::new(), 0, 0, &mut out);
    out
}

fn walk(schema: &SchemaDef, steps: Vec<Step>, def_level: i16, rep_level: i16, out: &mut Vec<LeafColumn>) {
    match schema {
        SchemaDef::Primitive { physical_type, .. } => out.push(LeafColumn {
            steps,
            physical_type: *physical_type,
            max_def_level: def_level,
            max_rep_level: rep_level,
        }),
        SchemaDef::Group { fields, .. } => {
            for (name, field) in fields {
                let mut child = steps.clone();
                child.push(Step::Field {
                    name: name.clone(),
                    optional: !field.is_required(),
                });
                let child_def = def_level + i16::from(!field.is_required());
                walk(field, child, child_def, rep_level, out);
            }
        }
        SchemaDef::List { element, .. } => {
            let mut child = steps;
            child.push(Step::ListElement);
            walk(element, child, def_level + 1, rep_level + 1, out);
        }
        SchemaDef::Map { key, value, .. } => {
            let mut key_steps = steps.clone();
            key_steps.push(Step::MapKey);
            walk(key, key_steps, def_level + 1, rep_level + 1, out);
            let mut value_steps = steps;
            value_steps.push(Step::MapValue);
            walk(value, value_steps, def_level + 1, rep_level + 1, out);
        }
    }
}

/// A single occurrence of a leaf column for one row: its value (`None` for
/// a null or absent occurrence) paired with its definition and repetition
/// level.
type Occurrence = (Option<Value>, i16, i16);

enum Cursor<'a> {
    Record(&'a Record),
    Value(&'a Value),
}

impl LeafColumn {
    fn occurrences(&self, record: &Record) -> Vec<Occurrence> {
        resolve(&self.steps, Cursor::Record(record), 0, 0)
    }

    /// Writes this column's values, drawn from `records` in order, into
    /// `writer` as a single batch.
    fn write(&self, writer: &mut ColumnWriter, records: &[Record]) -> Result<(), WriterError> {
        let occurrences: Vec<Occurrence> = records.iter().flat_map(|r| self.occurrences(r)).collect();
        let def_levels: Vec<i16> = occurrences.iter().map(|(_, d, _)| *d).collect();
        let rep_levels: Vec<i16> = occurrences.iter().map(|(_, _, r)| *r).collect();
        let rep_levels = if self.max_rep_level > 0 { Some(rep_levels.as_slice()) } else { None };

        macro_rules! present {
            ($pat:pat => $val:expr) => {
                occurrences
                    .iter()
                    .filter_map(|(v, ..)| match v {
                        Some($pat) => Some($val),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            };
        }

        match writer {
            ColumnWriter::BoolColumnWriter(cw) => {
                let values = present!(Value::Boolean(b) => *b);
                cw.write_batch(&values, Some(&def_levels), rep_levels)?;
            }
            ColumnWriter::Int32ColumnWriter(cw) => {
                let values = present!(Value::Int32(v) => *v);
                cw.write_batch(&values, Some(&def_levels), rep_levels)?;
            }
            ColumnWriter::Int64ColumnWriter(cw) => {
                let values = present!(Value::Int64(v) => *v);
                cw.write_batch(&values, Some(&def_levels), rep_levels)?;
            }
            ColumnWriter::Int96ColumnWriter(cw) => {
                let values = present!(Value::Int96(bytes) => int96_from_bytes(bytes));
                cw.write_batch(&values, Some(&def_levels), rep_levels)?;
            }
            ColumnWriter::FloatColumnWriter(cw) => {
                let values = present!(Value::Float(v) => *v);
                cw.write_batch(&values, Some(&def_levels), rep_levels)?;
            }
            ColumnWriter::DoubleColumnWriter(cw) => {
                let values = present!(Value::Double(v) => *v);
                cw.write_batch(&values, Some(&def_levels), rep_levels)?;
            }
            ColumnWriter::ByteArrayColumnWriter(cw) => {
                let values = present!(Value::Binary(bytes) => ByteArray::from(bytes.clone()));
                cw.write_batch(&values, Some(&def_levels), rep_levels)?;
            }
            ColumnWriter::FixedLenByteArrayColumnWriter(cw) => {
                let values =
                    present!(Value::Binary(bytes) => FixedLenByteArray::from(ByteArray::from(bytes.clone())));
                cw.write_batch(&values, Some(&def_levels), rep_levels)?;
            }
        }
        Ok(())
    }
}

fn int96_from_bytes(bytes: &[u8; 12]) -> Int96 {
    let word = |i: usize| u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
    let mut i96 = Int96::new();
    i96.set_data(word(0), word(1), word(2));
    i96
}

fn resolve(steps: &[Step], cursor: Cursor, def_so_far: i16, rep_so_far: i16) -> Vec<Occurrence> {
    let Some((head, rest)) = steps.split_first() else {
        return match cursor {
            Cursor::Value(v) if !v.is_null() => vec![(Some(v.clone()), def_so_far, rep_so_far)],
            _ => vec![(None, def_so_far, rep_so_far)],
        };
    };

    match head {
        Step::Field { name, optional } => {
            let found = match cursor {
                Cursor::Record(r) => r.get(name),
                Cursor::Value(Value::Group(r)) => r.get(name),
                Cursor::Value(_) => None,
            };
            match found {
                Some(v) if !v.is_null() => {
                    let next_def = if *optional { def_so_far + 1 } else { def_so_far };
                    resolve(rest, Cursor::Value(v), next_def, rep_so_far)
                }
                _ => vec![(None, def_so_far, rep_so_far)],
            }
        }
        Step::ListElement => {
            let items: &[Value] = match cursor {
                Cursor::Value(Value::List(items)) => items,
                _ => &[],
            };
            if items.is_empty() {
                vec![(None, def_so_far, rep_so_far)]
            } else {
                items
                    .iter()
                    .enumerate()
                    .flat_map(|(i, item)| {
                        let rep = if i == 0 { rep_so_far } else { rep_so_far + 1 };
                        resolve(rest, Cursor::Value(item), def_so_far + 1, rep)
                    })
                    .collect()
            }
        }
        Step::MapKey | Step::MapValue => {
            let pairs: &[(Value, Value)] = match cursor {
                Cursor::Value(Value::Map(pairs)) => pairs,
                _ => &[],
            };
            if pairs.is_empty() {
                vec![(None, def_so_far, rep_so_far)]
            } else {
                pairs
                    .iter()
                    .enumerate()
                    .flat_map(|(i, (k, v))| {
                        let rep = if i == 0 { rep_so_far } else { rep_so_far + 1 };
                        let chosen = if matches!(head, Step::MapKey) { k } else { v };
                        resolve(rest, Cursor::Value(chosen), def_so_far + 1, rep)
                    })
                    .collect()
            }
        }
    }
}

/// Writes one row group containing every record in `records`, in order,
/// shredded across `leaves`. `leaves` must be in the same order as the
/// writer's schema fields.
pub fn write_row_group<W: std::io::Write + Send>(
    file_writer: &mut SerializedFileWriter<W>,
    leaves: &[LeafColumn],
    records: &[Record],
) -> Result<(), WriterError> {
    let mut row_group_writer = file_writer.next_row_group()?;
    let mut idx = 0;
    while let Some(mut column_writer) = row_group_writer.next_column()? {
        let leaf = leaves
            .get(idx)
            .ok_or_else(|| WriterError::Encode("schema/row-group column count mismatch".to_string()))?;
        leaf.write(column_writer.untyped(), records)?;
        column_writer.close()?;
        idx += 1;
    }
    row_group_writer.close()?;
    Ok(())
}
