//! # Adaptive Batch Processor
//!
//! Drives a processor function over an item list in batches whose size follows
//! feedback from the previous batch.
//!
//! ## Sizing
//!
//! Adjustment is proportional to the distance from the bound being approached,
//! so the size settles instead of oscillating between floor and ceiling:
//!
//! - error rate or rate-limit usage above threshold: move `adjustment_factor` of
//!   the way down to `min_size`
//! - zero errors and usage below `comfortable_usage`: move `adjustment_factor` of
//!   the way up to `max_size`, always by at least one
//! - otherwise keep the current size
//!
//! ## Checkpoints and cancellation
//!
//! A [`Checkpoint`] goes to the configured sink each time the processed count
//! crosses a multiple of `checkpoint_interval`, and once more when the run ends.
//! Sink failures are logged and never stop the run. Cancellation is observed
//! between batches: items already dispatched finish, the rest are reported as
//! not started.

use super::checkpoint::{BatchItem, Checkpoint, CheckpointSink, FailedItem};
use crate::config::BatchConfig;
use crate::logging::{log_batch_progress, log_error};
use crate::remote::OperationError;
use crate::resilience::RemoteEndpointState;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// An item that completed successfully, with the processor's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSuccess<R> {
    pub item_id: String,
    pub value: R,
}

/// Structured outcome of a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRunResult<R> {
    pub run_id: Uuid,
    pub total_items: usize,
    pub succeeded: Vec<BatchSuccess<R>>,
    /// Items still failing after the executor's retries
    pub failed: Vec<FailedItem>,
    /// Items never dispatched because the run was cancelled
    pub not_started: Vec<String>,
    /// Size of each batch, in order
    pub batch_sizes: Vec<usize>,
    pub checkpoints_emitted: u32,
    pub cancelled: bool,
}

impl<R> BatchRunResult<R> {
    /// True when every item succeeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.not_started.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Batches work with feedback-driven sizing and periodic checkpoints
pub struct AdaptiveBatchProcessor {
    config: BatchConfig,
    endpoint: Option<Arc<RemoteEndpointState>>,
    sink: Option<Arc<dyn CheckpointSink>>,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for AdaptiveBatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveBatchProcessor")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint.as_ref().map(|e| e.name().to_string()))
            .field("has_sink", &self.sink.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

impl AdaptiveBatchProcessor {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            config: config.clone(),
            endpoint: None,
            sink: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Read rate-limit usage from this endpoint when sizing batches
    pub fn with_endpoint(mut self, endpoint: Arc<RemoteEndpointState>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_checkpoint_sink(mut self, sink: Arc<dyn CheckpointSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn initial_batch_size(&self) -> usize {
        self.config
            .base_size
            .clamp(self.config.min_size, self.config.max_size)
    }

    /// Size of the next batch given the last batch's error rate and current usage
    pub fn next_batch_size(&self, current: usize, error_rate: f64, usage: f64) -> usize {
        let floor = self.config.min_size;
        let ceiling = self.config.max_size.max(floor);
        let current = current.clamp(floor, ceiling);
        let factor = self.config.adjustment_factor;

        let next = if error_rate > self.config.error_rate_threshold
            || usage > self.config.usage_threshold
        {
            let step = ((current - floor) as f64 * factor).ceil() as usize;
            current - step
        } else if error_rate == 0.0 && usage < self.config.comfortable_usage {
            let step = ((ceiling - current) as f64 * factor).ceil() as usize;
            current + step
        } else {
            current
        };

        next.clamp(floor, ceiling)
    }

    fn current_usage(&self) -> f64 {
        self.endpoint
            .as_ref()
            .map_or(0.0, |endpoint| endpoint.rate_limit().usage_fraction())
    }

    /// Run `processor` over every item.
    ///
    /// Items within a batch run concurrently; the executor behind `processor`
    /// bounds how many are actually in flight.
    #[instrument(skip_all, fields(total_items = items.len()))]
    pub async fn process<'a, I, R, F, Fut>(
        &self,
        items: &'a [I],
        processor: F,
    ) -> BatchRunResult<R>
    where
        I: BatchItem,
        F: Fn(&'a I) -> Fut,
        Fut: Future<Output = Result<R, OperationError>>,
    {
        let run_id = Uuid::new_v4();
        let total = items.len();
        let interval = self.config.checkpoint_interval.max(1);

        let mut result = BatchRunResult {
            run_id,
            total_items: total,
            succeeded: Vec::new(),
            failed: Vec::new(),
            not_started: Vec::new(),
            batch_sizes: Vec::new(),
            checkpoints_emitted: 0,
            cancelled: false,
        };

        info!(run_id = %run_id, total_items = total, "📦 Starting adaptive batch run");

        let mut batch_size = self.initial_batch_size();
        let mut processed = 0usize;

        while processed < total {
            if self.cancellation.is_cancelled() {
                info!(run_id = %run_id, processed = processed, "🛑 Batch run cancelled");
                result.cancelled = true;
                break;
            }

            let end = (processed + batch_size).min(total);
            let batch = &items[processed..end];
            result.batch_sizes.push(batch.len());

            let outcomes = join_all(batch.iter().map(&processor)).await;

            let mut batch_failures = 0usize;
            for (item, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(value) => result.succeeded.push(BatchSuccess {
                        item_id: item.item_id(),
                        value,
                    }),
                    Err(error) => {
                        batch_failures += 1;
                        result.failed.push(FailedItem {
                            item_id: item.item_id(),
                            error,
                        });
                    }
                }
            }

            let previous = processed;
            processed = end;

            let error_rate = batch_failures as f64 / batch.len() as f64;
            let usage = self.current_usage();
            let next = self.next_batch_size(batch_size, error_rate, usage);
            if next != batch_size {
                debug!(
                    run_id = %run_id,
                    from = batch_size,
                    to = next,
                    error_rate = error_rate,
                    usage = usage,
                    "Adjusting batch size"
                );
            }
            batch_size = next;

            log_batch_progress(
                &run_id.to_string(),
                processed,
                total,
                batch_size,
                result.succeeded.len(),
                result.failed.len(),
            );

            // One checkpoint per interval boundary crossed, even when a single
            // batch spans several of them
            if processed < total {
                for _ in previous / interval..processed / interval {
                    self.emit_checkpoint(&mut result, processed, batch_size, false)
                        .await;
                }
            }
        }

        result.not_started = items[processed..].iter().map(BatchItem::item_id).collect();
        self.emit_checkpoint(&mut result, processed, batch_size, true)
            .await;

        info!(
            run_id = %run_id,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            not_started = result.not_started.len(),
            batches = result.batch_sizes.len(),
            "📦 Adaptive batch run finished"
        );

        result
    }

    async fn emit_checkpoint<R>(
        &self,
        result: &mut BatchRunResult<R>,
        processed: usize,
        next_batch_size: usize,
        is_final: bool,
    ) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let checkpoint = Checkpoint {
            run_id: result.run_id,
            sequence: result.checkpoints_emitted + 1,
            processed_count: processed,
            total_items: result.total_items,
            succeeded: result.succeeded.iter().map(|s| s.item_id.clone()).collect(),
            failed: result.failed.clone(),
            next_batch_size,
            created_at: Utc::now(),
            is_final,
        };

        match sink.save(&checkpoint).await {
            Ok(()) => {
                result.checkpoints_emitted += 1;
                debug!(
                    run_id = %checkpoint.run_id,
                    sequence = checkpoint.sequence,
                    processed = processed,
                    is_final = is_final,
                    "💾 Checkpoint saved"
                );
            }
            Err(error) => log_error(
                "batch_processor",
                "save_checkpoint",
                &error.to_string(),
                Some(&format!("run {} at {processed} items", checkpoint.run_id)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::checkpoint::{CallbackSink, CheckpointError, MemoryCheckpointSink};
    use crate::remote::ErrorKind;

    fn processor() -> AdaptiveBatchProcessor {
        AdaptiveBatchProcessor::new(&BatchConfig::default())
    }

    fn ids(count: i64) -> Vec<i64> {
        (1..=count).collect()
    }

    #[test]
    fn test_clean_batches_grow_strictly_to_ceiling() {
        let processor = processor();
        let mut size = processor.initial_batch_size();
        assert_eq!(size, 15);

        let mut sizes = vec![size];
        while size < 50 {
            let next = processor.next_batch_size(size, 0.0, 0.1);
            assert!(next > size, "size must grow from {size}");
            size = next;
            sizes.push(size);
        }
        assert_eq!(processor.next_batch_size(50, 0.0, 0.1), 50);
        assert_eq!(sizes[1], 33);
    }

    #[test]
    fn test_errors_or_usage_shrink_toward_floor() {
        let processor = processor();
        assert_eq!(processor.next_batch_size(15, 0.5, 0.0), 10);
        assert_eq!(processor.next_batch_size(15, 0.0, 0.95), 10);
        assert_eq!(processor.next_batch_size(6, 1.0, 0.0), 5);
        assert_eq!(processor.next_batch_size(5, 1.0, 1.0), 5);
    }

    #[test]
    fn test_middle_ground_holds_size() {
        let processor = processor();
        // Some errors but under threshold
        assert_eq!(processor.next_batch_size(20, 0.05, 0.1), 20);
        // No errors but usage not comfortable
        assert_eq!(processor.next_batch_size(20, 0.0, 0.6), 20);
    }

    #[tokio::test]
    async fn test_reports_successes_and_failures_structurally() {
        let items = ids(40);
        let result = processor()
            .process(&items, |id| async move {
                if id % 10 == 0 {
                    Err(OperationError::new(id.to_string(), ErrorKind::Validation, "bad"))
                } else {
                    Ok(id * 2)
                }
            })
            .await;

        assert_eq!(result.success_count(), 36);
        assert_eq!(result.failure_count(), 4);
        assert!(result.not_started.is_empty());
        assert!(!result.is_complete());
        assert_eq!(result.failed[0].item_id, "10");
        assert_eq!(result.succeeded[0].value, 2);
        assert_eq!(result.batch_sizes.iter().sum::<usize>(), 40);
    }

    #[tokio::test]
    async fn test_checkpoints_every_interval_plus_final() {
        let sink = Arc::new(MemoryCheckpointSink::new());
        let items = ids(250);
        let result = processor()
            .with_checkpoint_sink(sink.clone())
            .process(&items, |id| async move { Ok::<_, OperationError>(*id) })
            .await;

        let checkpoints = sink.checkpoints();
        assert_eq!(result.checkpoints_emitted as usize, checkpoints.len());
        assert_eq!(checkpoints.len(), 3);
        assert!(checkpoints[0].processed_count >= 100);
        assert!(checkpoints[1].processed_count >= 200);
        let last = checkpoints.last().unwrap();
        assert!(last.is_final);
        assert_eq!(last.processed_count, 250);
        assert_eq!(last.succeeded.len(), 250);
        assert!(last.pending(&items).is_empty());
    }

    #[tokio::test]
    async fn test_batch_spanning_several_intervals_checkpoints_each_one() {
        let config = BatchConfig {
            base_size: 50,
            min_size: 50,
            max_size: 50,
            checkpoint_interval: 10,
            ..BatchConfig::default()
        };
        let sink = Arc::new(MemoryCheckpointSink::new());
        let items = ids(120);
        let result = AdaptiveBatchProcessor::new(&config)
            .with_checkpoint_sink(sink.clone())
            .process(&items, |id| async move { Ok::<_, OperationError>(*id) })
            .await;

        assert_eq!(result.batch_sizes, vec![50, 50, 20]);
        let checkpoints = sink.checkpoints();
        // 5 boundaries in each of the first two batches, then the final one
        assert_eq!(checkpoints.len(), 11);
        assert_eq!(result.checkpoints_emitted, 11);

        let sequences: Vec<_> = checkpoints.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, (1..=11).collect::<Vec<_>>());
        assert!(checkpoints[..5].iter().all(|c| c.processed_count == 50));
        assert!(checkpoints[5..10].iter().all(|c| c.processed_count == 100));
        assert!(checkpoints[..10].iter().all(|c| !c.is_final));
        assert!(checkpoints[10].is_final);
        assert_eq!(checkpoints[10].processed_count, 120);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_abort_run() {
        let sink = Arc::new(CallbackSink::new(|checkpoint: &Checkpoint| {
            Err(CheckpointError::Rejected {
                run_id: checkpoint.run_id,
                sequence: checkpoint.sequence,
                reason: "disk full".to_string(),
            })
        }));
        let items = ids(120);
        let result = processor()
            .with_checkpoint_sink(sink)
            .process(&items, |id| async move { Ok::<_, OperationError>(*id) })
            .await;

        assert_eq!(result.success_count(), 120);
        assert_eq!(result.checkpoints_emitted, 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_batches() {
        let processor = processor();
        let token = processor.cancellation_token();
        let items = ids(100);

        let result = processor
            .process(&items, |id| {
                let token = token.clone();
                async move {
                    if *id == 3 {
                        token.cancel();
                    }
                    Ok::<_, OperationError>(())
                }
            })
            .await;

        assert!(result.cancelled);
        assert_eq!(result.success_count(), 15);
        assert_eq!(result.not_started.len(), 85);
        assert_eq!(result.not_started[0], "16");
    }
}
