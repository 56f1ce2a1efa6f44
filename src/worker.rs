use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::crypto;
use crate::engine::DownloadEngine;
use crate::error::{CoreError, CoreResult};
use crate::models::Status;
use crate::store::Store;

const PAUSE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const INTER_ITEM_DELAY: Duration = Duration::from_millis(500);
const SETTING_DOWNLOADS_PAUSED: &str = "downloads_paused";

/// The three flags spec.md §4.7 assigns the worker: `running`, `paused`,
/// `current_track_id`. Shared between the public handle and the spawned
/// loop task.
struct WorkerState {
    running: AtomicBool,
    paused: AtomicBool,
    current_track_id: Mutex<Option<String>>,
}

/// A single cooperative consumer draining `queued` items one at a time
/// (spec §4.7). Owns the store and download engine by composition, not by
/// singleton lookup (REDESIGN FLAG).
pub struct Worker {
    store: Arc<Store>,
    engine: Arc<DownloadEngine>,
    state: Arc<WorkerState>,
    cancel: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(store: Arc<Store>, engine: Arc<DownloadEngine>) -> Self {
        Self {
            store,
            engine,
            state: Arc::new(WorkerState {
                running: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                current_track_id: Mutex::new(None),
            }),
            cancel: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    pub async fn current_track_id(&self) -> Option<String> {
        self.state.current_track_id.lock().await.clone()
    }

    /// No-op if already running. Resets any `downloading` row left behind
    /// by a crash (I2), promotes every `pending` row to `queued`, then
    /// spawns the consumer loop.
    pub async fn start(&self) -> CoreResult<()> {
        if self.is_running() {
            return Ok(());
        }

        let reset = self.store.reset_stale_downloading().await?;
        if reset > 0 {
            warn!(count = reset, "recovered stale downloading item(s) on startup");
        }
        self.store.promote_pending_to_queued().await?;

        match crypto::sweep_orphan_staging(self.engine.download_root(), &[]).await {
            Ok(deleted) if deleted > 0 => {
                info!(count = deleted, "removed orphaned staging file(s) on startup");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "orphan staging sweep failed"),
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock().await = Some(cancel.clone());

        let start_paused = self
            .store
            .get_setting(SETTING_DOWNLOADS_PAUSED)
            .await?
            .is_some_and(|v| v == "true");

        self.state.running.store(true, Ordering::SeqCst);
        self.state.paused.store(start_paused, Ordering::SeqCst);

        let store = self.store.clone();
        let engine = self.engine.clone();
        let state = self.state.clone();
        let loop_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            run_loop(store, engine, state, loop_cancel).await;
        });
        *self.handle.lock().await = Some(handle);

        Ok(())
    }

    /// Flip the flag and persist it to the `downloads_paused` setting
    /// (spec §3/§4.7) so a restart resumes in the same state.
    pub async fn pause(&self) -> CoreResult<()> {
        self.state.paused.store(true, Ordering::SeqCst);
        self.store.set_setting(SETTING_DOWNLOADS_PAUSED, "true").await
    }

    pub async fn resume(&self) -> CoreResult<()> {
        self.state.paused.store(false, Ordering::SeqCst);
        self.store.set_setting(SETTING_DOWNLOADS_PAUSED, "false").await
    }

    /// Cooperative cancellation: signals the token, then awaits the loop
    /// task so any in-flight item has finished its cleanup path before this
    /// returns.
    pub async fn stop(&self) {
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
        self.state.running.store(false, Ordering::SeqCst);
        *self.state.current_track_id.lock().await = None;
    }

    pub async fn restart(&self) -> CoreResult<()> {
        self.stop().await;
        self.start().await
    }
}

async fn run_loop(
    store: Arc<Store>,
    engine: Arc<DownloadEngine>,
    state: Arc<WorkerState>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        if state.paused.load(Ordering::SeqCst) {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(PAUSE_POLL_INTERVAL) => continue,
            }
        }

        let next = match store.next_queued().await {
            Ok(next) => next,
            Err(e) => {
                error!(error = %e, "failed reading next queued item, backing off");
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                continue;
            }
        };

        let item = match next {
            Some(item) => item,
            None => {
                state.running.store(false, Ordering::SeqCst);
                break;
            }
        };

        if let Err(e) = store.set_status(item.id, Status::Downloading, Some(0), None).await {
            error!(error = %e, "failed marking item downloading");
            continue;
        }
        *state.current_track_id.lock().await = Some(item.track_id.clone());

        let (progress_tx, mut progress_rx) = mpsc::channel::<(u64, u64)>(16);
        let progress_store = store.clone();
        let progress_id = item.id;
        let progress_task = tokio::spawn(async move {
            while let Some((downloaded, total)) = progress_rx.recv().await {
                let pct = if total > 0 {
                    ((downloaded as f64 / total as f64) * 100.0).min(100.0) as u8
                } else {
                    0
                };
                let _ = progress_store
                    .set_status(progress_id, Status::Downloading, Some(pct), None)
                    .await;
            }
        });

        let result = engine.run(&item, progress_tx, &cancel).await;
        let _ = progress_task.await;

        match result {
            Ok(outcome) => {
                info!(
                    track_id = %item.track_id,
                    path = %outcome.final_path.display(),
                    "download completed"
                );
                if let Err(e) = store.set_status(item.id, Status::Completed, Some(100), None).await {
                    error!(error = %e, "failed marking item completed");
                }
            }
            Err(CoreError::Canceled) => {
                if let Err(e) = store
                    .set_status(item.id, Status::Error, None, Some("stopped"))
                    .await
                {
                    error!(error = %e, "failed marking item stopped");
                }
                *state.current_track_id.lock().await = None;
                break;
            }
            Err(e) => {
                warn!(track_id = %item.track_id, error = %e, "download failed");
                if let Err(store_err) = store
                    .set_status(item.id, Status::Error, None, Some(&e.to_string()))
                    .await
                {
                    error!(error = %store_err, "failed recording item error");
                }
            }
        }

        *state.current_track_id.lock().await = None;

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(INTER_ITEM_DELAY) => {}
        }
    }

    state.running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Credential, ProtocolClient};
    use crate::engine::EngineSettings;
    use std::path::PathBuf;

    async fn build_worker() -> (Worker, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let client = Arc::new(ProtocolClient::new(Credential::OAuth("t".into())).unwrap());
        let settings = EngineSettings {
            download_root: PathBuf::from("/tmp/yamuse-dl-test"),
            file_template: "{artist} - {title}".into(),
            folder_structure: "{artist}/{album}".into(),
        };
        let engine = Arc::new(DownloadEngine::new(client, store.clone(), settings));
        (Worker::new(store.clone(), engine), store)
    }

    #[tokio::test]
    async fn start_is_idempotent_when_already_running() {
        let (worker, _store) = build_worker().await;
        worker.start().await.unwrap();
        assert!(worker.is_running());
        worker.start().await.unwrap();
        assert!(worker.is_running());
        worker.stop().await;
    }

    #[tokio::test]
    async fn stop_clears_running_and_current_track_on_empty_queue() {
        let (worker, _store) = build_worker().await;
        worker.start().await.unwrap();
        worker.stop().await;
        assert!(!worker.is_running());
        assert!(worker.current_track_id().await.is_none());
    }

    #[tokio::test]
    async fn empty_queue_leaves_worker_not_running_after_drain() {
        let (worker, _store) = build_worker().await;
        worker.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn pause_resume_flags_toggle() {
        let (worker, _store) = build_worker().await;
        assert!(!worker.is_paused());
        worker.pause().await.unwrap();
        assert!(worker.is_paused());
        worker.resume().await.unwrap();
        assert!(!worker.is_paused());
    }

    #[tokio::test]
    async fn pause_setting_survives_a_restart() {
        let (worker, _store) = build_worker().await;
        worker.start().await.unwrap();
        worker.pause().await.unwrap();
        worker.restart().await.unwrap();
        assert!(worker.is_paused());
        worker.stop().await;
    }
}
