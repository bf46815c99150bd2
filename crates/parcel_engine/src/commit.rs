//! Committed length of the output table, kept in a sidecar file next to it.
//!
//! The sink stores the output length after every synced batch. Anything past
//! that length was torn by a crash and is cut off before the next run reads
//! the table.
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use parcel_core::OBJECT_ID_COLUMN;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::source::header_position;

const MARKER_SUFFIX: &str = ".committed";

/// Sidecar holding the committed byte length of one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMarker {
    path: PathBuf,
}

impl CommitMarker {
    pub fn for_output(output: &Path) -> Self {
        let mut name = output.as_os_str().to_os_string();
        name.push(MARKER_SUFFIX);
        Self {
            path: PathBuf::from(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the marker is absent or unreadable.
    pub fn load(&self) -> Option<u64> {
        match fs::read_to_string(&self.path) {
            Ok(text) => match text.trim().parse() {
                Ok(len) => Some(len),
                Err(_) => {
                    engine_warn!("Ignoring malformed commit marker {:?}", self.path);
                    None
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                engine_warn!("Cannot read commit marker {:?}: {}", self.path, err);
                None
            }
        }
    }

    pub fn store(&self, len: u64) -> Result<(), PersistError> {
        let filename = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                PersistError::OutputDir(format!("{} is not a file path", self.path.display()))
            })?;
        AtomicFileWriter::for_file(&self.path).write(filename, format!("{len}\n").as_bytes())?;
        Ok(())
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Output length before and after [`recover_output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    pub before: u64,
    pub after: u64,
    /// A commit marker decided the cut.
    pub tracked: bool,
}

impl Recovery {
    pub fn discarded(&self) -> u64 {
        self.before - self.after
    }
}

/// Cut uncommitted bytes off the end of `output`.
///
/// With a valid marker the file is truncated to the committed length. Without
/// one, a harvest table is cut after its last complete record; other files
/// are left alone. A missing or empty output drops any stale marker.
pub fn recover_output(output: &Path) -> Result<Recovery, PersistError> {
    let marker = CommitMarker::for_output(output);
    let len = match fs::metadata(output) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => 0,
        Err(err) => return Err(err.into()),
    };
    if len == 0 {
        marker.clear()?;
        return Ok(Recovery {
            before: 0,
            after: 0,
            tracked: false,
        });
    }

    let recovery = match marker.load() {
        Some(committed) if committed <= len => Recovery {
            before: len,
            after: committed,
            tracked: true,
        },
        Some(committed) => {
            engine_warn!(
                "Commit marker says {} bytes but {:?} holds {}; ignoring it",
                committed,
                output,
                len
            );
            untracked(output, len)?
        }
        None => untracked(output, len)?,
    };

    if recovery.after < len {
        OpenOptions::new()
            .write(true)
            .open(output)
            .and_then(|file| {
                file.set_len(recovery.after)?;
                file.sync_all()
            })?;
        engine_info!(
            "Discarded {} uncommitted bytes at the end of {:?}",
            recovery.discarded(),
            output
        );
    }
    Ok(recovery)
}

fn untracked(output: &Path, len: u64) -> Result<Recovery, PersistError> {
    let keep = if is_harvest_table(output) {
        complete_records_len(File::open(output)?)?
    } else {
        len
    };
    Ok(Recovery {
        before: len,
        after: keep,
        tracked: false,
    })
}

fn is_harvest_table(output: &Path) -> bool {
    csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(output)
        .and_then(|mut reader| reader.headers().cloned())
        .map(|headers| header_position(&headers, OBJECT_ID_COLUMN).is_some())
        .unwrap_or(false)
}

/// Length of the prefix ending at the last record terminator outside quotes.
fn complete_records_len(file: File) -> io::Result<u64> {
    let mut reader = BufReader::new(file);
    let mut in_quotes = false;
    let mut offset = 0u64;
    let mut keep = 0u64;
    loop {
        let chunk = reader.fill_buf()?;
        if chunk.is_empty() {
            break;
        }
        for &byte in chunk {
            offset += 1;
            match byte {
                b'"' => in_quotes = !in_quotes,
                b'\n' if !in_quotes => keep = offset,
                _ => {}
            }
        }
        let consumed = chunk.len();
        reader.consume(consumed);
    }
    Ok(keep)
}
