use crate::error::{ServiceError, ServiceResult};
use crate::models::{LogRecord, SessionMeta};
use arrow::array::{
    Array, ArrayRef, Int32Array, Int64Array, StringArray, UInt16Array, UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub const CHUNK_SIZE: usize = 50_000;

#[derive(Default)]
pub struct ArrowBuilder {
    host: Vec<String>,
    client_identd: Vec<String>,
    user_id: Vec<String>,
    ts_ns: Vec<i64>,
    utc_offset_secs: Vec<i32>,
    method: Vec<String>,
    endpoint: Vec<String>,
    protocol: Vec<String>,
    response_code: Vec<u16>,
    content_size: Vec<u64>,
    row_id: Vec<u32>,
}

impl ArrowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rec: LogRecord) {
        self.host.push(rec.host);
        self.client_identd.push(rec.client_identd);
        self.user_id.push(rec.user_id);
        self.ts_ns.push(rec.ts_ns);
        self.utc_offset_secs.push(rec.utc_offset_secs);
        self.method.push(rec.method);
        self.endpoint.push(rec.endpoint);
        self.protocol.push(rec.protocol);
        self.response_code.push(rec.response_code);
        self.content_size.push(rec.content_size);
        self.row_id.push(rec.row_id);
    }

    pub fn len(&self) -> usize {
        self.row_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_id.is_empty()
    }

    /// Build a batch from the buffered rows and reset the buffers.
    pub fn finish_batch(&mut self) -> Result<RecordBatch, arrow::error::ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.host))),
            Arc::new(StringArray::from(std::mem::take(&mut self.client_identd))),
            Arc::new(StringArray::from(std::mem::take(&mut self.user_id))),
            Arc::new(Int64Array::from(std::mem::take(&mut self.ts_ns))),
            Arc::new(Int32Array::from(std::mem::take(&mut self.utc_offset_secs))),
            Arc::new(StringArray::from(std::mem::take(&mut self.method))),
            Arc::new(StringArray::from(std::mem::take(&mut self.endpoint))),
            Arc::new(StringArray::from(std::mem::take(&mut self.protocol))),
            Arc::new(UInt16Array::from(std::mem::take(&mut self.response_code))),
            Arc::new(UInt64Array::from(std::mem::take(&mut self.content_size))),
            Arc::new(UInt32Array::from(std::mem::take(&mut self.row_id))),
        ];

        RecordBatch::try_new(get_arrow_schema(), columns)
    }
}

pub fn get_arrow_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("host", DataType::Utf8, false),
        Field::new("client_identd", DataType::Utf8, false),
        Field::new("user_id", DataType::Utf8, false),
        Field::new("ts_ns", DataType::Int64, false),
        Field::new("utc_offset_secs", DataType::Int32, false),
        Field::new("method", DataType::Utf8, false),
        Field::new("endpoint", DataType::Utf8, false),
        Field::new("protocol", DataType::Utf8, false),
        Field::new("response_code", DataType::UInt16, false),
        Field::new("content_size", DataType::UInt64, false),
        Field::new("row_id", DataType::UInt32, false),
    ]))
}

pub fn write_arrow_chunk(batch: &RecordBatch, path: &Path) -> ServiceResult<()> {
    let file = File::create(path)?;
    let mut writer = StreamWriter::try_new(file, &batch.schema())?;
    writer.write(batch)?;
    writer.finish()?;
    Ok(())
}

pub fn read_arrow_chunk(path: &Path) -> ServiceResult<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = StreamReader::try_new(file, None)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}

/// Serialize batches as one Arrow IPC stream.
pub fn write_ipc_stream<W: Write>(out: W, batches: &[RecordBatch]) -> ServiceResult<()> {
    let schema = get_arrow_schema();
    let mut writer = StreamWriter::try_new(out, &schema)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.finish()?;
    Ok(())
}

/// Typed view over the columns of a stored batch.
pub struct LogColumns<'a> {
    pub host: &'a StringArray,
    pub ts_ns: &'a Int64Array,
    pub utc_offset_secs: &'a Int32Array,
    pub endpoint: &'a StringArray,
    pub response_code: &'a UInt16Array,
    pub content_size: &'a UInt64Array,
}

impl<'a> LogColumns<'a> {
    pub fn new(batch: &'a RecordBatch) -> ServiceResult<Self> {
        Ok(Self {
            host: column(batch, "host")?,
            ts_ns: column(batch, "ts_ns")?,
            utc_offset_secs: column(batch, "utc_offset_secs")?,
            endpoint: column(batch, "endpoint")?,
            response_code: column(batch, "response_code")?,
            content_size: column(batch, "content_size")?,
        })
    }

    pub fn len(&self) -> usize {
        self.host.len()
    }
}

pub fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> ServiceResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| ServiceError::Internal(format!("Column '{}' missing or mistyped", name)))
}

pub struct MetaCollector {
    pub row_count: usize,
    pub t_min_ns: i64,
    pub t_max_ns: i64,
    pub distinct_hosts: HashSet<String>,
    pub total_bytes: u64,
}

impl MetaCollector {
    pub fn new() -> Self {
        Self {
            row_count: 0,
            t_min_ns: i64::MAX,
            t_max_ns: i64::MIN,
            distinct_hosts: HashSet::new(),
            total_bytes: 0,
        }
    }

    pub fn update(&mut self, rec: &LogRecord) {
        self.row_count += 1;
        self.t_min_ns = self.t_min_ns.min(rec.ts_ns);
        self.t_max_ns = self.t_max_ns.max(rec.ts_ns);
        self.total_bytes = self.total_bytes.saturating_add(rec.content_size);
        if !self.distinct_hosts.contains(&rec.host) {
            self.distinct_hosts.insert(rec.host.clone());
        }
    }

    pub fn into_meta(
        self,
        source: &str,
        format: &str,
        rejected_count: usize,
        blank_lines: usize,
    ) -> SessionMeta {
        SessionMeta {
            source: source.to_string(),
            format: format.to_string(),
            row_count: self.row_count,
            rejected_count,
            blank_lines,
            t_min_ns: if self.row_count > 0 { self.t_min_ns } else { 0 },
            t_max_ns: if self.row_count > 0 { self.t_max_ns } else { 0 },
            distinct_hosts: self.distinct_hosts.len(),
            total_bytes: self.total_bytes,
        }
    }
}

impl Default for MetaCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(host: &str, ts_ns: i64, code: u16, size: u64, row_id: u32) -> LogRecord {
        LogRecord {
            host: host.into(),
            client_identd: "-".into(),
            user_id: "-".into(),
            ts_ns,
            utc_offset_secs: -4 * 3600,
            method: "GET".into(),
            endpoint: "/".into(),
            protocol: "HTTP/1.0".into(),
            response_code: code,
            content_size: size,
            row_id,
        }
    }

    #[test]
    fn test_builder_round_trip_through_ipc() {
        let mut builder = ArrowBuilder::new();
        builder.push(record("a", 10, 200, 100, 0));
        builder.push(record("b", 20, 404, 0, 1));
        assert_eq!(builder.len(), 2);

        let batch = builder.finish_batch().unwrap();
        assert!(builder.is_empty());
        assert_eq!(batch.num_rows(), 2);

        let path = std::env::temp_dir().join(format!("clf-chunk-{}.arrow", uuid::Uuid::new_v4()));
        write_arrow_chunk(&batch, &path).unwrap();
        let batches = read_arrow_chunk(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(batches.len(), 1);
        let cols = LogColumns::new(&batches[0]).unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols.host.value(1), "b");
        assert_eq!(cols.response_code.value(1), 404);
        assert_eq!(cols.utc_offset_secs.value(0), -4 * 3600);
    }

    #[test]
    fn test_meta_collector() {
        let mut collector = MetaCollector::new();
        collector.update(&record("a", 30, 200, 100, 0));
        collector.update(&record("b", 10, 200, 50, 1));
        collector.update(&record("a", 20, 304, 0, 2));

        let meta = collector.into_meta("access.log", "clf", 2, 1);
        assert_eq!(meta.row_count, 3);
        assert_eq!(meta.t_min_ns, 10);
        assert_eq!(meta.t_max_ns, 30);
        assert_eq!(meta.distinct_hosts, 2);
        assert_eq!(meta.total_bytes, 150);
        assert_eq!(meta.rejected_count, 2);

        let empty = MetaCollector::new().into_meta("x", "clf", 0, 0);
        assert_eq!(empty.t_min_ns, 0);
        assert_eq!(empty.t_max_ns, 0);
    }
}
