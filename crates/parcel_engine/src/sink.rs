use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use engine_logging::engine_debug;
use parcel_core::{OutputRow, OUTPUT_COLUMNS};
use thiserror::Error;

use crate::commit::CommitMarker;
use crate::persist::PersistError;
use crate::resume::ResumeState;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write output {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode output rows: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to record committed length: {0}")]
    Commit(#[from] PersistError),
    #[error("output writer task failed: {0}")]
    Worker(String),
}

/// Mutable state of one harvest run, shared by all workers through the sink.
#[derive(Debug, Default)]
pub struct HarvestState {
    pending_buffer: Vec<OutputRow>,
    completed_ids: HashSet<String>,
    header_written: bool,
}

impl HarvestState {
    pub fn new(completed_ids: HashSet<String>, header_written: bool) -> Self {
        Self {
            pending_buffer: Vec::new(),
            completed_ids,
            header_written,
        }
    }

    pub fn from_resume(resume: ResumeState) -> Self {
        Self::new(resume.completed_ids, resume.output_initialized)
    }

    pub fn completed_ids(&self) -> &HashSet<String> {
        &self.completed_ids
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn pending_len(&self) -> usize {
        self.pending_buffer.len()
    }
}

/// Result of one successful flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub rows: usize,
    pub total_rows: u64,
}

/// Buffers output rows and appends them to a CSV file in batches.
///
/// Appending, threshold check, writing and clearing all happen under one
/// lock, so concurrent workers never interleave partial batches or write the
/// header twice. After every synced batch the new file length is stored in a
/// [`CommitMarker`]; a batch that failed half way is cut off before the next
/// write.
pub struct ChunkedSink {
    path: PathBuf,
    marker: CommitMarker,
    threshold: usize,
    inner: Mutex<SinkInner>,
}

struct SinkInner {
    state: HarvestState,
    total_rows: u64,
    /// Output length after the last batch of this run; `None` before the first.
    committed_len: Option<u64>,
}

impl ChunkedSink {
    pub fn new(path: impl Into<PathBuf>, threshold: usize, state: HarvestState) -> Self {
        let path = path.into();
        Self {
            marker: CommitMarker::for_output(&path),
            path,
            threshold: threshold.max(1),
            inner: Mutex::new(SinkInner {
                state,
                total_rows: 0,
                committed_len: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows committed to disk by this sink.
    pub fn rows_written(&self) -> u64 {
        self.lock().total_rows
    }

    pub fn pending_len(&self) -> usize {
        self.lock().state.pending_len()
    }

    /// Buffer all rows of one entity; flushes once the threshold is reached.
    pub fn push(&self, rows: Vec<OutputRow>) -> Result<Option<FlushReport>, SinkError> {
        let mut inner = self.lock();
        inner.state.pending_buffer.extend(rows);
        if inner.state.pending_buffer.len() >= self.threshold {
            self.flush_locked(&mut inner).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Write whatever is still buffered.
    pub fn finish(&self) -> Result<Option<FlushReport>, SinkError> {
        let mut inner = self.lock();
        if inner.state.pending_buffer.is_empty() {
            return Ok(None);
        }
        self.flush_locked(&mut inner).map(Some)
    }

    /// [`push`](Self::push) on the blocking pool, off the async workers.
    pub async fn push_blocking(
        self: Arc<Self>,
        rows: Vec<OutputRow>,
    ) -> Result<Option<FlushReport>, SinkError> {
        off_runtime(move || self.push(rows)).await
    }

    /// [`finish`](Self::finish) on the blocking pool.
    pub async fn finish_blocking(self: Arc<Self>) -> Result<Option<FlushReport>, SinkError> {
        off_runtime(move || self.finish()).await
    }

    fn lock(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush_locked(&self, inner: &mut SinkInner) -> Result<FlushReport, SinkError> {
        let bytes = encode_batch(&inner.state.pending_buffer, !inner.state.header_written)?;
        let committed = if inner.state.header_written {
            self.append(&bytes, inner.committed_len)?
        } else {
            self.create(&bytes)?
        };
        inner.committed_len = Some(committed);

        let state = &mut inner.state;
        let rows = state.pending_buffer.len();
        state.pending_buffer.clear();
        state.header_written = true;
        inner.total_rows += rows as u64;
        engine_debug!("flushed {} rows to {:?}", rows, self.path);
        Ok(FlushReport {
            rows,
            total_rows: inner.total_rows,
        })
    }

    /// Start a new table. The empty commit comes first so a torn first batch
    /// is discarded on recovery.
    fn create(&self, bytes: &[u8]) -> Result<u64, SinkError> {
        self.marker.store(0)?;
        let mut file = File::create(&self.path).map_err(|err| self.io_error(err))?;
        file.write_all(bytes)
            .and_then(|()| file.sync_data())
            .map_err(|err| self.io_error(err))?;
        let len = bytes.len() as u64;
        self.marker.store(len)?;
        Ok(len)
    }

    /// One write per batch at the committed end, then fsync and commit.
    fn append(&self, bytes: &[u8], committed: Option<u64>) -> Result<u64, SinkError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| self.io_error(err))?;
        let base = match committed {
            Some(committed) => self.roll_back(&file, committed)?,
            None => self.adopt(&mut file)?,
        };
        file.seek(SeekFrom::Start(base))
            .and_then(|_| file.write_all(bytes))
            .and_then(|()| file.sync_data())
            .map_err(|err| self.io_error(err))?;
        let len = base + bytes.len() as u64;
        self.marker.store(len)?;
        Ok(len)
    }

    /// Drop bytes a failed batch left past the committed length.
    fn roll_back(&self, file: &File, committed: u64) -> Result<u64, SinkError> {
        let len = file.metadata().map_err(|err| self.io_error(err))?.len();
        if len > committed {
            engine_debug!(
                "discarding {} bytes of a failed batch in {:?}",
                len - committed,
                self.path
            );
            file.set_len(committed).map_err(|err| self.io_error(err))?;
        }
        Ok(committed.min(len))
    }

    /// First write of this run to a table from an earlier run: terminate its
    /// last line and commit the current length as the baseline.
    fn adopt(&self, file: &mut File) -> Result<u64, SinkError> {
        let repaired = ends_with_newline(file)
            .and_then(|terminated| {
                if !terminated {
                    file.seek(SeekFrom::End(0))?;
                    file.write_all(b"\n")?;
                    file.sync_data()?;
                }
                file.metadata()
            })
            .map_err(|err| self.io_error(err))?;
        let len = repaired.len();
        self.marker.store(len)?;
        Ok(len)
    }

    fn io_error(&self, source: io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

async fn off_runtime<F>(work: F) -> Result<Option<FlushReport>, SinkError>
where
    F: FnOnce() -> Result<Option<FlushReport>, SinkError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .unwrap_or_else(|err| Err(SinkError::Worker(err.to_string())))
}

/// Whether the file is empty or its last byte is a newline.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn encode_batch(rows: &[OutputRow], with_header: bool) -> Result<Vec<u8>, SinkError> {
    let mut bytes = Vec::new();
    if with_header {
        bytes.extend_from_slice(UTF8_BOM);
    }
    let mut writer = csv::Writer::from_writer(bytes);
    if with_header {
        writer.write_record(OUTPUT_COLUMNS)?;
    }
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer
        .into_inner()
        .map_err(|err| SinkError::Csv(csv::Error::from(err.into_error())))
}
