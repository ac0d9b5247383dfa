use crate::attendance::ingest::MarkEntry;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// What the client would have sent to the mark endpoint had it been online.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OfflinePayload {
    #[schema(example = 3)]
    pub class_id: u64,
    #[schema(example = "2024-03-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub entries: Vec<MarkEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueuedSubmission {
    #[schema(example = "offline_5c1f0e2a-8c1e-4c43-9a55-0d2b8c7e3f10")]
    pub offline_id: String,
    pub payload: OfflinePayload,
    #[schema(format = "date-time", value_type = String)]
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    #[schema(nullable = true)]
    pub last_error: Option<String>,
}

/// Destination of a replay. Implementations must be idempotent on
/// `offline_id`; resubmitting a stored submission is a success.
pub trait Submitter {
    type Error: Display;

    async fn submit(&self, submission: &QueuedSubmission) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncFailure {
    pub offline_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncReport {
    pub synced: usize,
    /// Submissions that failed in this pass
    pub failed: usize,
    /// Submissions still pending after this pass
    pub retained: usize,
    pub errors: Vec<SyncFailure>,
}

/// FIFO of offline submissions. A replay never drops an unsent item: it either
/// stays pending or, after `max_attempts`, moves to the failed list.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    pending: VecDeque<QueuedSubmission>,
    failed: Vec<QueuedSubmission>,
    max_attempts: u32,
}

impl OfflineQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            failed: Vec::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Rebuilds a queue from submissions a client kept across restarts.
    pub fn from_submissions(submissions: Vec<QueuedSubmission>, max_attempts: u32) -> Self {
        let mut queue = Self::new(max_attempts);
        for submission in submissions {
            queue.push(submission);
        }
        queue
    }

    fn push(&mut self, submission: QueuedSubmission) {
        if submission.attempts >= self.max_attempts {
            self.failed.push(submission);
        } else {
            self.pending.push_back(submission);
        }
    }

    pub fn enqueue(&mut self, payload: OfflinePayload) -> String {
        let offline_id = format!("offline_{}", Uuid::new_v4());
        self.pending.push_back(QueuedSubmission {
            offline_id: offline_id.clone(),
            payload,
            queued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        });
        offline_id
    }

    pub fn pending(&self) -> impl Iterator<Item = &QueuedSubmission> {
        self.pending.iter()
    }

    pub fn failed(&self) -> &[QueuedSubmission] {
        &self.failed
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn into_parts(self) -> (Vec<QueuedSubmission>, Vec<QueuedSubmission>) {
        (self.pending.into(), self.failed)
    }

    /// Submits pending items one at a time, in queue order.
    pub async fn replay<S: Submitter>(&mut self, submitter: &S) -> SyncReport {
        let mut report = SyncReport::default();
        let batch: Vec<QueuedSubmission> = self.pending.drain(..).collect();

        debug!(pending = batch.len(), "Replaying offline submissions");

        for mut submission in batch {
            match submitter.submit(&submission).await {
                Ok(()) => {
                    report.synced += 1;
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(offline_id = %submission.offline_id, error = %message, "Offline submission failed");

                    submission.attempts += 1;
                    submission.last_error = Some(message.clone());
                    report.failed += 1;
                    report.errors.push(SyncFailure {
                        offline_id: submission.offline_id.clone(),
                        error: message,
                    });
                    self.push(submission);
                }
            }
        }

        report.retained = self.pending.len();
        info!(
            synced = report.synced,
            failed = report.failed,
            retained = report.retained,
            "Offline replay finished"
        );
        report
    }
}
