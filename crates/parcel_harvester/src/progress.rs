use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use engine_logging::{engine_debug, engine_info};
use parcel_engine::{HarvestEvent, ProgressSink};

/// Turns engine events into periodic log lines.
pub struct LogProgress {
    total: Option<usize>,
    every: usize,
    completed: AtomicUsize,
    started: Instant,
}

impl LogProgress {
    pub fn new(every: usize) -> Self {
        Self {
            total: None,
            every: every.max(1),
            completed: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    fn position(&self, done: usize) -> String {
        match self.total {
            Some(total) => format!("{done}/{total}"),
            None => done.to_string(),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogProgress {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::EntityCompleted { .. } => {
                let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % self.every == 0 || Some(done) == self.total {
                    let elapsed = self.started.elapsed().as_secs_f64();
                    let rate = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
                    engine_info!("{} entities done ({:.1}/s)", self.position(done), rate);
                }
            }
            HarvestEvent::Flushed { rows, total_rows } => {
                engine_info!("Saved {} rows ({} this run)", rows, total_rows);
            }
            HarvestEvent::TileDecoded { tile, features } => {
                let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
                engine_debug!("tile {}/{}/{}: {} features", tile.zoom, tile.x, tile.y, features);
                if done % self.every == 0 || Some(done) == self.total {
                    engine_info!("{} tiles scanned", self.position(done));
                }
            }
            HarvestEvent::TileFailed { .. } => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::{ApiStatus, TileCoordinate};

    #[test]
    fn counts_entities_and_tiles() {
        let progress = LogProgress::new(2).with_total(3);
        for id in ["1", "2"] {
            progress.emit(HarvestEvent::EntityCompleted {
                object_id: id.to_string(),
                status: ApiStatus::Success,
                rows: 1,
                attempts: 1,
            });
        }
        progress.emit(HarvestEvent::Flushed {
            rows: 2,
            total_rows: 2,
        });
        progress.emit(HarvestEvent::TileFailed {
            tile: TileCoordinate::new(1, 0, 0),
            reason: "http status 404".to_string(),
        });
        assert_eq!(progress.completed(), 3);
        assert_eq!(progress.position(3), "3/3");
        assert_eq!(LogProgress::new(10).position(4), "4");
    }
}
