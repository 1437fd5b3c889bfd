// src/services/sync_dispatcher.rs
//
// External Sync Dispatcher
//
// Fire-and-forget submission of jobs toward remote services. The engine
// never observes the outcome: local state is already committed when a job
// is enqueued, and failures are the worker's to log.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::SeriesVoteType;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryAction {
    HistoryAdd,
    HistoryRemove,
}

/// Work item for a remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncJob {
    /// Set the watched flag of a file on the remote "my list"
    UpdateMyListFileStatus {
        file_id: Uuid,
        hash: Option<String>,
        watched: bool,
        watched_at: Option<DateTime<Utc>>,
    },
    /// Add or remove an episode from the tracker history
    SendEpisodeWatchState {
        user_id: Uuid,
        episode_id: Uuid,
        remote_episode_id: Option<i64>,
        action: HistoryAction,
        watched_at: Option<DateTime<Utc>>,
    },
    /// `value` is the decimal rating, -1 to delete
    VoteSeries {
        remote_anime_id: i64,
        value: f64,
        vote_type: SeriesVoteType,
    },
    VoteEpisode {
        remote_episode_id: i64,
        value: f64,
    },
}

impl SyncJob {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncJob::UpdateMyListFileStatus { .. } => "update_my_list_file_status",
            SyncJob::SendEpisodeWatchState { .. } => "send_episode_watch_state",
            SyncJob::VoteSeries { .. } => "vote_series",
            SyncJob::VoteEpisode { .. } => "vote_episode",
        }
    }

    pub fn to_payload(&self) -> AppResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Seam between the engine and whatever runs remote jobs
#[cfg_attr(test, mockall::automock)]
pub trait SyncDispatcher: Send + Sync {
    fn enqueue(&self, job: SyncJob);
}

/// Client that performs a job against the remote service
#[async_trait::async_trait]
pub trait RemoteSyncClient: Send + Sync {
    async fn execute(&self, job: &SyncJob) -> anyhow::Result<()>;
}

/// Dispatcher backed by an unbounded queue and one worker task
pub struct QueuedSyncDispatcher {
    sender: Mutex<Option<UnboundedSender<SyncJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueuedSyncDispatcher {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(client: Arc<dyn RemoteSyncClient>) -> AppResult<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Other(format!("Sync dispatcher needs a tokio runtime: {}", e)))?;

        let (sender, mut receiver) = mpsc::unbounded_channel::<SyncJob>();

        let worker = handle.spawn(async move {
            while let Some(job) = receiver.recv().await {
                let kind = job.kind();
                match client.execute(&job).await {
                    Ok(()) => log::debug!("Sync job {} completed", kind),
                    Err(e) => log::warn!("Sync job {} failed: {:#}", kind, e),
                }
            }
            log::debug!("Sync dispatcher queue closed");
        });

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Close the queue and wait for queued jobs to drain.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                log::error!("Sync dispatcher worker ended abnormally: {}", e);
            }
        }
    }
}

impl SyncDispatcher for QueuedSyncDispatcher {
    fn enqueue(&self, job: SyncJob) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => {
                log::debug!("Scheduling sync job {}", job.kind());
                if let Err(e) = sender.send(job) {
                    log::error!("Sync job {} dropped: worker gone", e.0.kind());
                }
            }
            None => log::warn!("Sync job {} dropped: dispatcher shut down", job.kind()),
        }
    }
}
