use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use engine_logging::{engine_info, engine_warn};
use parcel_core::{normalize_identifier, EntityRecord, OBJECT_ID_COLUMN};

use crate::source::header_position;

/// What a previous run left behind in the output file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResumeState {
    pub completed_ids: HashSet<String>,
    /// The output already holds a header (or unreadable content); append
    /// without writing another header.
    pub output_initialized: bool,
    /// `false` when the output exists but could not be read.
    pub resume_enabled: bool,
}

impl ResumeState {
    fn fresh() -> Self {
        Self {
            completed_ids: HashSet::new(),
            output_initialized: false,
            resume_enabled: true,
        }
    }

    fn disabled() -> Self {
        Self {
            completed_ids: HashSet::new(),
            output_initialized: true,
            resume_enabled: false,
        }
    }
}

/// Scan the id column of an existing output. Never fails: unreadable
/// output disables resume instead.
pub fn load_resume_state(output: &Path) -> ResumeState {
    let meta = match fs::metadata(output) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return ResumeState::fresh(),
        Err(err) => {
            engine_warn!("Cannot inspect output {:?}, resume disabled: {}", output, err);
            return ResumeState::disabled();
        }
    };
    if meta.len() == 0 {
        return ResumeState::fresh();
    }

    match scan_completed_ids(output) {
        Ok((completed_ids, torn_rows)) => {
            if torn_rows > 0 {
                engine_warn!(
                    "Ignored {} incomplete rows in {:?}; their entities will be fetched again",
                    torn_rows,
                    output
                );
            }
            engine_info!(
                "Found {} processed entities in {:?}",
                completed_ids.len(),
                output
            );
            ResumeState {
                completed_ids,
                output_initialized: true,
                resume_enabled: true,
            }
        }
        Err(reason) => {
            engine_warn!("Cannot read output {:?}, resume disabled: {}", output, reason);
            ResumeState::disabled()
        }
    }
}

/// Completed ids plus the number of rows skipped because they were cut short.
fn scan_completed_ids(output: &Path) -> Result<(HashSet<String>, usize), String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(output)
        .map_err(|err| err.to_string())?;
    let headers = reader.headers().map_err(|err| err.to_string())?.clone();
    let id_col = header_position(&headers, OBJECT_ID_COLUMN)
        .ok_or_else(|| format!("no `{OBJECT_ID_COLUMN}` column"))?;

    let mut completed = HashSet::new();
    let mut torn_rows = 0;
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .map_err(|err| err.to_string())?
    {
        // A row interrupted mid-write has fewer fields than the header.
        if record.len() < headers.len() {
            torn_rows += 1;
            continue;
        }
        let raw = String::from_utf8_lossy(&record[id_col]);
        if let Some(id) = normalize_identifier(&raw) {
            completed.insert(id);
        }
    }
    Ok((completed, torn_rows))
}

/// Candidates whose object id is not in `completed`, in input order.
pub fn filter_pending(
    candidates: Vec<EntityRecord>,
    completed: &HashSet<String>,
) -> Vec<EntityRecord> {
    candidates
        .into_iter()
        .filter(|record| !completed.contains(&record.object_id))
        .collect()
}
