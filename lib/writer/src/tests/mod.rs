//! End-to-end pipeline tests: build a schema and a handful of records, run
//! them through [`GenericBuilder`], then read the produced Parquet files
//! back with `parquet::file::reader::SerializedFileReader` and assert on
//! their contents, driving a real temp directory rather than mocking the
//! writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parquet::basic::{Compression, Type as PhysicalType};
use parquet::file::reader::{FileReader, SerializedFileReader};

use rotor_model::{ColumnPath, Record, SchemaDef, Value};

use super::*;

fn rec(fields: Vec<(&str, Value)>) -> Record {
    fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn schema_id_only() -> Arc<SchemaDef> {
    Arc::new(SchemaDef::group(vec![(
        "id".to_string(),
        SchemaDef::primitive(PhysicalType::INT32),
    )]))
}

fn schema_id_color() -> Arc<SchemaDef> {
    Arc::new(SchemaDef::group(vec![
        ("id".to_string(), SchemaDef::primitive(PhysicalType::INT32)),
        (
            "color".to_string(),
            SchemaDef::primitive(PhysicalType::BYTE_ARRAY).optional(),
        ),
    ]))
}

fn uncompressed() -> WriterOptions {
    WriterOptions {
        compression: Compression::UNCOMPRESSED,
    }
}

/// Recursively collects every `.parquet` file beneath `base`.
fn collect_parquet_files(base: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(base, &mut out);
    return out;

    fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, out);
            } else if path.to_string_lossy().ends_with(".parquet") {
                out.push(path);
            }
        }
    }
}

fn read_rows(path: &Path) -> Vec<serde_json::Value> {
    let file = std::fs::File::open(path).unwrap();
    let reader = SerializedFileReader::new(file).unwrap();
    reader
        .get_row_iter(None)
        .unwrap()
        .map(|r| r.unwrap().to_json_value())
        .collect()
}

/// Drives `pipe` to completion, collecting every item it emits downstream,
/// then surfaces the pipeline's terminal result.
async fn drain<Item>(mut pipe: Pipe<Item>) -> Result<Vec<Item>, WriterError>
where
    Item: Unpin,
{
    let mut out = Vec::new();
    while let Some(item) = pipe.next().await {
        out.push(item);
    }
    pipe.join().await?;
    Ok(out)
}

#[tokio::test]
async fn scenario_partitions_by_color() {
    let dir = tempfile::tempdir().unwrap();
    let records = vec![
        rec(vec![("id", Value::Int32(1)), ("color", Value::string("red"))]),
        rec(vec![("id", Value::Int32(2)), ("color", Value::string("red"))]),
        rec(vec![("id", Value::Int32(3)), ("color", Value::string("blue"))]),
    ];

    let pipe = GenericBuilder::new(dir.path(), schema_id_color())
        .partition_by(vec![ColumnPath::parse("color").unwrap()])
        .max_count(1000)
        .options(uncompressed())
        .build(tokio_stream::iter(records))
        .unwrap();
    drain(pipe).await.unwrap();

    let red_files = collect_parquet_files(&dir.path().join("color=red"));
    let blue_files = collect_parquet_files(&dir.path().join("color=blue"));
    assert_eq!(red_files.len(), 1);
    assert_eq!(blue_files.len(), 1);

    let red_rows = read_rows(&red_files[0]);
    assert_eq!(red_rows.len(), 2);
    assert!(red_rows[0].get("color").is_none(), "color must not survive partitioning");
    assert!(red_rows[0].get("id").is_some());

    let blue_rows = read_rows(&blue_files[0]);
    assert_eq!(blue_rows.len(), 1);
}

#[tokio::test]
async fn scenario_max_count_rotates_without_partitioning() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<Record> = (1..=5).map(|i| rec(vec![("id", Value::Int32(i))])).collect();

    let pipe = GenericBuilder::new(dir.path(), schema_id_only())
        .max_count(2)
        .options(uncompressed())
        .build(tokio_stream::iter(records))
        .unwrap();
    drain(pipe).await.unwrap();

    let files = collect_parquet_files(dir.path());
    assert_eq!(files.len(), 3);

    let mut groups: Vec<Vec<i64>> = files
        .iter()
        .map(|f| read_rows(f).iter().map(|r| r["id"].as_i64().unwrap()).collect())
        .collect();
    groups.sort_by_key(|g| g[0]);
    assert_eq!(groups, vec![vec![1, 2], vec![3, 4], vec![5]]);
}

#[tokio::test]
async fn scenario_null_partition_field_fails() {
    let dir = tempfile::tempdir().unwrap();
    let records = vec![rec(vec![("id", Value::Int32(1)), ("color", Value::Null)])];

    let pipe = GenericBuilder::new(dir.path(), schema_id_color())
        .partition_by(vec![ColumnPath::parse("color").unwrap()])
        .options(uncompressed())
        .build(tokio_stream::iter(records))
        .unwrap();

    let err = drain(pipe).await.unwrap_err();
    assert_eq!(err.to_string(), "bad partition: null field 'color'");
    assert!(collect_parquet_files(dir.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn timer_rotation_produces_multiple_files_under_single_partition() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<Record> = (1..=10).map(|i| rec(vec![("id", Value::Int32(i))])).collect();
    let upstream = Box::pin(tokio_stream::iter(records).then(|r| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        r
    }));

    let pipe = GenericBuilder::new(dir.path(), schema_id_only())
        .max_count(1_000_000)
        .max_duration(Duration::from_millis(50))
        .chunk_size(1)
        .options(uncompressed())
        .build(upstream)
        .unwrap();
    drain(pipe).await.unwrap();

    let files = collect_parquet_files(dir.path());
    assert!(files.len() >= 2, "expected at least two rotated files, got {}", files.len());

    let total: usize = files.iter().map(|f| read_rows(f).len()).sum();
    assert_eq!(total, 10);
}

#[tokio::test]
async fn scenario_post_write_handler_flush_forces_new_file_per_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<Record> = (1..=4).map(|i| rec(vec![("id", Value::Int32(i))])).collect();

    let handler: PostWriteHandler<Record> = Arc::new(|snapshot, flush| {
        for path in snapshot.modified_partitions.keys() {
            flush.flush(path.clone());
        }
        Ok(())
    });

    let pipe = GenericBuilder::new(dir.path(), schema_id_only())
        .chunk_size(2)
        .options(uncompressed())
        .post_write_handler(handler)
        .build(tokio_stream::iter(records))
        .unwrap();
    drain(pipe).await.unwrap();

    let files = collect_parquet_files(dir.path());
    assert_eq!(files.len(), 2, "each chunk should have been flushed to its own file");

    let mut sizes: Vec<usize> = files.iter().map(|f| read_rows(f).len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 2]);
}

#[tokio::test]
async fn scenario_nested_partition_column_drops_emptied_parent() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(SchemaDef::group(vec![
        ("id".to_string(), SchemaDef::primitive(PhysicalType::INT32)),
        (
            "color".to_string(),
            SchemaDef::primitive(PhysicalType::BYTE_ARRAY).optional(),
        ),
        (
            "user".to_string(),
            SchemaDef::group(vec![(
                "address".to_string(),
                SchemaDef::group(vec![(
                    "postcode".to_string(),
                    SchemaDef::primitive(PhysicalType::BYTE_ARRAY).optional(),
                )])
                .optional(),
            )])
            .optional(),
        ),
    ]));

    let address = rec(vec![("postcode", Value::string("XY"))]);
    let user = rec(vec![("address", Value::Group(address))]);
    let record = rec(vec![
        ("id", Value::Int32(1)),
        ("user", Value::Group(user)),
        ("color", Value::string("red")),
    ]);

    let pipe = GenericBuilder::new(dir.path(), schema)
        .partition_by(vec![
            ColumnPath::parse("color").unwrap(),
            ColumnPath::parse("user.address.postcode").unwrap(),
        ])
        .options(uncompressed())
        .build(tokio_stream::iter(vec![record]))
        .unwrap();
    drain(pipe).await.unwrap();

    let expected_dir = dir.path().join("color=red").join("user.address.postcode=XY");
    let files = collect_parquet_files(&expected_dir);
    assert_eq!(files.len(), 1);

    let rows = read_rows(&files[0]);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].get("color").is_none());
    assert!(rows[0].get("user").is_none(), "emptied 'address' should have dropped 'user' too");
}

#[tokio::test]
async fn zero_records_creates_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let pipe = GenericBuilder::new(dir.path(), schema_id_only())
        .options(uncompressed())
        .build(tokio_stream::iter(Vec::<Record>::new()))
        .unwrap();
    drain(pipe).await.unwrap();
    assert!(collect_parquet_files(dir.path()).is_empty());
}

#[tokio::test]
async fn max_count_one_splits_every_record_into_its_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<Record> = (1..=3).map(|i| rec(vec![("id", Value::Int32(i))])).collect();

    let pipe = GenericBuilder::new(dir.path(), schema_id_only())
        .max_count(1)
        .options(uncompressed())
        .build(tokio_stream::iter(records))
        .unwrap();
    drain(pipe).await.unwrap();

    let files = collect_parquet_files(dir.path());
    assert_eq!(files.len(), 3);
    for f in &files {
        assert_eq!(read_rows(f).len(), 1);
    }
}

#[tokio::test]
async fn schema_resolution_fails_when_partitioning_empties_the_schema() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(SchemaDef::group(vec![(
        "color".to_string(),
        SchemaDef::primitive(PhysicalType::BYTE_ARRAY),
    )]));

    let err = GenericBuilder::new(dir.path(), schema)
        .partition_by(vec![ColumnPath::parse("color").unwrap()])
        .options(uncompressed())
        .build(tokio_stream::iter(Vec::<Record>::new()))
        .unwrap_err();

    assert!(matches!(err, WriterError::SchemaResolution(_)));
}
