use crate::arrow_io::{read_arrow_chunk, write_arrow_chunk, ArrowBuilder, MetaCollector, CHUNK_SIZE};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{LogRecord, SessionMeta};
use arrow::record_batch::RecordBatch;
use clf_parser::{ParseOutcome, RejectedLine};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// On-disk layout per session:
///
/// ```text
/// <base>/<uuid>/meta.json
/// <base>/<uuid>/rejected.mp
/// <base>/<uuid>/chunks/000.arrow ...
/// ```
pub struct SessionStorage {
    base_path: PathBuf,
}

impl SessionStorage {
    pub fn new(base_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn create_session(&self) -> std::io::Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let session_path = self.base_path.join(&session_id);

        fs::create_dir_all(session_path.join("chunks"))?;

        Ok(session_id)
    }

    /// Path of an existing session. Ids that are not UUIDs never reach the
    /// file system.
    pub fn session_path(&self, session_id: &str) -> ServiceResult<PathBuf> {
        let id = Uuid::parse_str(session_id)
            .map_err(|_| ServiceError::NotFound(session_id.to_string()))?;
        let path = self.base_path.join(id.to_string());
        if !path.is_dir() {
            return Err(ServiceError::NotFound(session_id.to_string()));
        }
        Ok(path)
    }

    pub fn delete_session(&self, session_id: &str) -> ServiceResult<()> {
        let session_path = self.session_path(session_id)?;
        fs::remove_dir_all(session_path)?;
        Ok(())
    }

    pub fn write_meta(&self, session_id: &str, meta: &SessionMeta) -> ServiceResult<()> {
        let meta_path = self.session_path(session_id)?.join("meta.json");
        let json = serde_json::to_string_pretty(meta)?;
        fs::write(meta_path, json)?;
        Ok(())
    }

    pub fn read_meta(&self, session_id: &str) -> ServiceResult<SessionMeta> {
        let meta_path = self.session_path(session_id)?.join("meta.json");
        if !meta_path.exists() {
            // upload still in progress or failed half way
            return Err(ServiceError::NotFound(session_id.to_string()));
        }
        let json = fs::read_to_string(meta_path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn write_rejected(&self, session_id: &str, rejected: &[RejectedLine]) -> ServiceResult<()> {
        let path = self.session_path(session_id)?.join("rejected.mp");
        let msgpack = rmp_serde::to_vec(rejected)?;
        fs::write(path, msgpack)?;
        Ok(())
    }

    pub fn read_rejected(&self, session_id: &str) -> ServiceResult<Vec<RejectedLine>> {
        let path = self.session_path(session_id)?.join("rejected.mp");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let msgpack = fs::read(path)?;
        Ok(rmp_serde::from_slice(&msgpack)?)
    }

    pub fn chunk_path(&self, session_id: &str, chunk_idx: usize) -> ServiceResult<PathBuf> {
        Ok(self
            .session_path(session_id)?
            .join("chunks")
            .join(format!("{:03}.arrow", chunk_idx)))
    }

    /// Chunk files in index order. Names are zero-padded to three digits
    /// only, so `1000.arrow` must still come after `999.arrow`.
    pub fn list_chunks(&self, session_id: &str) -> ServiceResult<Vec<PathBuf>> {
        let chunks_dir = self.session_path(session_id)?.join("chunks");
        let mut chunks = Vec::new();

        for entry in fs::read_dir(chunks_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("arrow") {
                continue;
            }
            if let Some(idx) = chunk_index(&path) {
                chunks.push((idx, path));
            }
        }

        chunks.sort_by_key(|(idx, _)| *idx);
        Ok(chunks.into_iter().map(|(_, path)| path).collect())
    }

    /// All stored batches of a session, in row order.
    pub fn load_batches(&self, session_id: &str) -> ServiceResult<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        for chunk in self.list_chunks(session_id)? {
            batches.extend(read_arrow_chunk(&chunk)?);
        }
        debug!("Loaded {} batches for session {}", batches.len(), session_id);
        Ok(batches)
    }
}

fn chunk_index(path: &Path) -> Option<usize> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// Coerce parsed lines, write Arrow chunks, rejected lines and metadata.
///
/// Lines that fail coercion join the rejected set instead of failing the
/// whole ingest.
pub fn ingest_outcome(
    storage: &SessionStorage,
    session_id: &str,
    source: &str,
    format: &str,
    outcome: ParseOutcome,
) -> ServiceResult<SessionMeta> {
    let mut builder = ArrowBuilder::new();
    let mut meta_collector = MetaCollector::new();
    let mut rejected = outcome.rejected;
    let mut chunk_idx = 0;
    let mut row_id: u32 = 0;

    for line in outcome.parsed {
        match LogRecord::from_parsed(&line.fields, row_id) {
            Ok(rec) => {
                meta_collector.update(&rec);
                builder.push(rec);
                row_id += 1;
            }
            Err(reason) => {
                rejected.push(RejectedLine {
                    line_no: line.line_no,
                    raw: line.raw,
                    reason,
                });
                continue;
            }
        }

        if builder.len() >= CHUNK_SIZE {
            let batch = builder.finish_batch()?;
            write_arrow_chunk(&batch, &storage.chunk_path(session_id, chunk_idx)?)?;
            chunk_idx += 1;
        }
    }

    if !builder.is_empty() {
        let batch = builder.finish_batch()?;
        write_arrow_chunk(&batch, &storage.chunk_path(session_id, chunk_idx)?)?;
    }

    rejected.sort_by_key(|r| r.line_no);
    storage.write_rejected(session_id, &rejected)?;

    let meta = meta_collector.into_meta(source, format, rejected.len(), outcome.blank_lines);
    storage.write_meta(session_id, &meta)?;

    info!(
        "Ingested session {}: {} rows, {} rejected",
        session_id, meta.row_count, meta.rejected_count
    );
    Ok(meta)
}
