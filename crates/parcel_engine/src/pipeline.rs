//! End-to-end runs wiring the components together.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_error, engine_info};
use parcel_core::{BoundingBox, GridError, TileGrid};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::collect::{collect_entities, TileFailure};
use crate::commit::recover_output;
use crate::fetch::{AttributeClient, TileSource};
use crate::persist::{ensure_output_dir, parent_dir, PersistError};
use crate::pool::{FetchWorkerPool, HarvestSummary};
use crate::resume::{filter_pending, load_resume_state};
use crate::settings::{HarvestSettings, TileSettings};
use crate::sink::{ChunkedSink, HarvestState, SinkError};
use crate::source::{read_entities, write_entities, InputError};
use crate::{HarvestEvent, ProgressSink};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub input_entities: usize,
    /// Entities skipped because a previous run already wrote them.
    pub already_completed: usize,
    pub resume_enabled: bool,
    pub summary: HarvestSummary,
}

/// Harvest every entity of `input` not yet present in `output`.
pub async fn run_harvest(
    client: Arc<dyn AttributeClient>,
    input: &Path,
    output: &Path,
    settings: &HarvestSettings,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<HarvestReport, PipelineError> {
    let table = read_entities(input)?;
    let input_entities = table.records.len();

    recover_output(output)?;
    let resume = load_resume_state(output);
    let resume_enabled = resume.resume_enabled;
    let state = HarvestState::from_resume(resume);
    let pending = filter_pending(table.records, state.completed_ids());
    let already_completed = input_entities - pending.len();
    engine_info!(
        "{} entities in input, {} already done, {} remaining",
        input_entities,
        already_completed,
        pending.len()
    );

    let mut report = HarvestReport {
        input_entities,
        already_completed,
        resume_enabled,
        summary: HarvestSummary::default(),
    };
    if pending.is_empty() {
        engine_info!("Nothing left to harvest for {:?}", output);
        return Ok(report);
    }

    ensure_output_dir(&parent_dir(output))?;
    let sink = Arc::new(ChunkedSink::new(output, settings.chunk_size, state));
    let pool = FetchWorkerPool::new(client, settings.retry.clone(), settings.concurrency);

    let outcome = pool.run(pending, sink.clone(), progress.clone(), cancel).await;
    let flushed = sink.clone().finish_blocking().await;
    let summary = match (outcome, flushed) {
        (Ok(summary), Ok(flush)) => {
            if let Some(flush) = flush {
                progress.emit(HarvestEvent::Flushed {
                    rows: flush.rows,
                    total_rows: flush.total_rows,
                });
            }
            summary
        }
        (Err(err), flushed) => {
            if let Err(final_err) = flushed {
                engine_error!("final flush also failed: {}", final_err);
            }
            return Err(err.into());
        }
        (Ok(_), Err(err)) => return Err(err.into()),
    };

    engine_info!(
        "Harvest finished: {} entities, {} rows written to {:?}{}",
        summary.entities,
        sink.rows_written(),
        output,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    report.summary = summary;
    Ok(report)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileReport {
    pub grid: TileGrid,
    pub tiles_scanned: usize,
    pub features_seen: usize,
    pub entities: usize,
    pub failures: Vec<TileFailure>,
    pub output: PathBuf,
}

/// Enumerate the tiles covering `bbox` and write the entity table to
/// `output`.
pub async fn run_tile_enumeration(
    source: &dyn TileSource,
    bbox: &BoundingBox,
    zoom: u8,
    settings: &TileSettings,
    output: &Path,
    progress: &dyn ProgressSink,
) -> Result<TileReport, PipelineError> {
    let grid = TileGrid::covering(bbox, zoom)?;
    engine_info!(
        "Scanning {} tiles at zoom {} (x {}..={}, y {}..={})",
        grid.len(),
        zoom,
        grid.x_min,
        grid.x_max,
        grid.y_min,
        grid.y_max
    );

    let collection =
        collect_entities(source, &grid, settings.extent, settings.concurrency, progress).await;
    let written = write_entities(output, &collection.records)?;
    engine_info!(
        "Wrote {} entities from {} features to {:?} ({} tiles failed)",
        collection.records.len(),
        collection.features_seen,
        written,
        collection.failures.len()
    );

    Ok(TileReport {
        grid,
        tiles_scanned: collection.tiles_scanned,
        features_seen: collection.features_seen,
        entities: collection.records.len(),
        failures: collection.failures,
        output: written,
    })
}
