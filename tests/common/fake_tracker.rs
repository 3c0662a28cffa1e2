use async_trait::async_trait;
use cascade_core::models::{OperationCategory, OperationPriority, TaskId, TaskRecord};
use cascade_core::propagation::LabelWriter;
use cascade_core::remote::{QuotaMetadata, RemoteOperation, RemoteRejection, RemoteResponse};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the fake does with the next call
#[derive(Debug, Clone)]
pub enum Scripted {
    Succeed,
    Reject(RemoteRejection),
    /// Never answers; only an operation timeout ends the call
    Hang,
}

/// In-memory tracker endpoint with a scripted failure queue.
///
/// Calls consume `script` front to back and succeed once it is empty. Label
/// writes are applied only on success.
#[derive(Debug, Default)]
pub struct FakeTracker {
    labels: Mutex<BTreeMap<TaskId, BTreeSet<String>>>,
    script: Mutex<VecDeque<Scripted>>,
    per_task: Mutex<BTreeMap<TaskId, VecDeque<Scripted>>>,
    quota: Mutex<Option<QuotaMetadata>>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Report quota on every response, counting `remaining` down per call
    pub fn with_quota(self, limit: u32, remaining: u32, resets_in: ChronoDuration) -> Self {
        *self.quota.lock() = Some(QuotaMetadata {
            limit,
            remaining,
            reset_at: Utc::now() + resets_in,
        });
        self
    }

    pub fn script(&self, steps: impl IntoIterator<Item = Scripted>) {
        self.script.lock().extend(steps);
    }

    /// Script failures for writes to one task only
    pub fn script_task(&self, task_id: TaskId, steps: impl IntoIterator<Item = Scripted>) {
        self.per_task
            .lock()
            .entry(task_id)
            .or_default()
            .extend(steps);
    }

    pub fn seed_labels(&self, records: &[TaskRecord]) {
        let mut labels = self.labels.lock();
        for record in records {
            labels.insert(record.id, record.labels.clone());
        }
    }

    pub fn labels_of(&self, task_id: TaskId) -> BTreeSet<String> {
        self.labels.lock().get(&task_id).cloned().unwrap_or_default()
    }

    /// `records` with labels replaced by what the tracker now holds
    pub fn refresh(&self, records: &[TaskRecord]) -> Vec<TaskRecord> {
        records
            .iter()
            .cloned()
            .map(|mut record| {
                record.labels = self.labels_of(record.id);
                record
            })
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// A generic operation against this tracker that returns its call number
    pub fn operation(
        self: &Arc<Self>,
        id: impl Into<String>,
        priority: OperationPriority,
    ) -> RemoteOperation<usize> {
        let tracker = Arc::clone(self);
        RemoteOperation::new(id, OperationCategory::Read, priority, move || {
            let tracker = Arc::clone(&tracker);
            async move { tracker.call(None).await }
        })
    }

    async fn call(&self, task_id: Option<TaskId>) -> Result<RemoteResponse<usize>, RemoteRejection> {
        let number = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlightGuard(&self.in_flight);

        let step = task_id
            .and_then(|id| self.per_task.lock().get_mut(&id).and_then(VecDeque::pop_front))
            .or_else(|| self.script.lock().pop_front())
            .unwrap_or(Scripted::Succeed);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let quota = self.quota.lock().as_mut().map(|quota| {
            quota.remaining = quota.remaining.saturating_sub(1);
            *quota
        });

        match step {
            Scripted::Succeed => {
                let response = RemoteResponse::new(number);
                Ok(match quota {
                    Some(quota) => response.with_quota(quota),
                    None => response,
                })
            }
            Scripted::Reject(rejection) => Err(match quota {
                Some(quota) => rejection.with_quota(quota),
                None => rejection,
            }),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(RemoteRejection::status(504, "hung call released"))
            }
        }
    }
}

/// Decrements the in-flight count even when a timed-out call is dropped
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LabelWriter for FakeTracker {
    async fn replace_labels(
        &self,
        task_id: TaskId,
        labels: &BTreeSet<String>,
    ) -> Result<RemoteResponse<()>, RemoteRejection> {
        let response = self.call(Some(task_id)).await?;
        self.labels.lock().insert(task_id, labels.clone());
        Ok(RemoteResponse {
            payload: (),
            quota: response.quota,
        })
    }
}
