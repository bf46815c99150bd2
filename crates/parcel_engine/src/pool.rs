use std::collections::BTreeMap;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_error, engine_warn};
use parcel_core::{classify, ApiStatus, EntityRecord, FetchResolution, RetryDecision, RetryPolicy};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::fetch::AttributeClient;
use crate::sink::{ChunkedSink, SinkError};
use crate::{HarvestEvent, ProgressSink};

/// Counts gathered over one run of the pool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarvestSummary {
    pub entities: usize,
    pub rows: u64,
    pub by_status: BTreeMap<ApiStatus, usize>,
    /// Stopped early through the cancellation token.
    pub cancelled: bool,
}

impl HarvestSummary {
    pub fn count(&self, status: ApiStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
struct EntityReport {
    status: ApiStatus,
    rows: usize,
}

/// Run the retry loop for one object id.
pub async fn fetch_with_retry(
    client: &dyn AttributeClient,
    object_id: &str,
    policy: &RetryPolicy,
) -> FetchResolution {
    let mut attempt = 1;
    loop {
        let outcome = client.fetch_attributes(object_id).await;
        match policy.decide(&outcome, attempt) {
            RetryDecision::Terminal => {
                return FetchResolution {
                    outcome,
                    attempts: attempt,
                    exhausted: false,
                }
            }
            RetryDecision::GiveUp => {
                engine_warn!(
                    "object {} failed after {} attempts: {}",
                    object_id,
                    attempt,
                    outcome
                );
                return FetchResolution {
                    outcome,
                    attempts: attempt,
                    exhausted: true,
                };
            }
            RetryDecision::RetryAfter(delay) => {
                engine_debug!(
                    "object {} attempt {}: {}, retrying in {:?}",
                    object_id,
                    attempt,
                    outcome,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Fetches entities with at most `concurrency` of them in flight.
pub struct FetchWorkerPool {
    client: Arc<dyn AttributeClient>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl FetchWorkerPool {
    pub fn new(client: Arc<dyn AttributeClient>, policy: RetryPolicy, concurrency: usize) -> Self {
        Self {
            client,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch, classify and buffer every entity. Results arrive in completion
    /// order. Stops admitting work when cancelled or when the sink fails;
    /// in-flight entities always finish. The caller flushes the sink.
    pub async fn run(
        &self,
        entities: Vec<EntityRecord>,
        sink: Arc<ChunkedSink>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Result<HarvestSummary, SinkError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut summary = HarvestSummary::default();
        let mut failure = None;

        for entity in entities {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            while let Some(joined) = tasks.try_join_next() {
                record_result(&mut summary, &mut failure, joined);
            }
            if failure.is_some() {
                break;
            }

            let client = self.client.clone();
            let policy = self.policy.clone();
            let sink = sink.clone();
            let progress = progress.clone();
            tasks.spawn(async move {
                let _permit = permit;
                process_entity(client.as_ref(), &policy, &entity, sink, progress.as_ref()).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            record_result(&mut summary, &mut failure, joined);
        }
        summary.cancelled = cancel.is_cancelled();
        summary.rows = sink.rows_written() + sink.pending_len() as u64;

        match failure {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}

async fn process_entity(
    client: &dyn AttributeClient,
    policy: &RetryPolicy,
    entity: &EntityRecord,
    sink: Arc<ChunkedSink>,
    progress: &dyn ProgressSink,
) -> Result<EntityReport, SinkError> {
    let resolution = fetch_with_retry(client, &entity.object_id, policy).await;
    let rows = classify(entity, &resolution);
    let report = EntityReport {
        status: resolution.status(),
        rows: rows.len(),
    };

    let flushed = sink.push_blocking(rows).await?;
    progress.emit(HarvestEvent::EntityCompleted {
        object_id: entity.object_id.clone(),
        status: report.status,
        rows: report.rows,
        attempts: resolution.attempts,
    });
    if let Some(flush) = flushed {
        progress.emit(HarvestEvent::Flushed {
            rows: flush.rows,
            total_rows: flush.total_rows,
        });
    }
    Ok(report)
}

fn record_result(
    summary: &mut HarvestSummary,
    failure: &mut Option<SinkError>,
    joined: Result<Result<EntityReport, SinkError>, JoinError>,
) {
    match joined {
        Ok(Ok(report)) => {
            summary.entities += 1;
            *summary.by_status.entry(report.status).or_insert(0) += 1;
        }
        Ok(Err(err)) => {
            engine_error!("output write failed: {}", err);
            // The rows stay buffered in the sink, so the entity still counts.
            summary.entities += 1;
            if failure.is_none() {
                *failure = Some(err);
            }
        }
        Err(err) => engine_error!("harvest task aborted: {}", err),
    }
}
