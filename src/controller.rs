use std::collections::HashSet;
use std::sync::Arc;

use crate::client::ProtocolClient;
use crate::engine::{DownloadEngine, EngineSettings};
use crate::error::CoreResult;
use crate::models::{EnqueueOutcome, Quality, QueueItem, QueueStats, Status, TrackRequest};
use crate::store::{ClearScope, Store};
use crate::worker::Worker;

/// Thin synchronous-per-call facade over the Catalog Store and Queue Worker
/// (spec §4.8). Every method returns once its store/worker call completes;
/// none of them block on a download.
pub struct Controller {
    store: Arc<Store>,
    client: Arc<ProtocolClient>,
    worker: Worker,
}

impl Controller {
    pub fn new(store: Arc<Store>, client: Arc<ProtocolClient>, engine_settings: EngineSettings) -> Self {
        let engine = Arc::new(DownloadEngine::new(client.clone(), store.clone(), engine_settings));
        let worker = Worker::new(store.clone(), engine);
        Self { store, client, worker }
    }

    /// Bulk enqueue (spec §4.8 `add_tracks`); new items start `pending`
    /// until `start()` promotes them. When `clear_previous` is set, every
    /// `pending`/`queued` row is removed first (not `downloading`, so an
    /// in-flight item is left alone, nor `completed`/`error`, which are
    /// catalog history) so the batch replaces rather than appends to
    /// whatever was waiting before.
    pub async fn add_tracks(
        &self,
        batch: &[TrackRequest],
        quality: Quality,
        clear_previous: bool,
    ) -> CoreResult<EnqueueOutcome> {
        let cleared = if clear_previous {
            self.store.clear(ClearScope::Pending).await? as u32
        } else {
            0
        };
        let mut outcome = self.store.enqueue(batch, quality, Status::Pending).await?;
        outcome.cleared = cleared;
        Ok(outcome)
    }

    pub async fn add_one(&self, track: TrackRequest, quality: Quality) -> CoreResult<EnqueueOutcome> {
        self.add_tracks(std::slice::from_ref(&track), quality, false).await
    }

    /// Resolve `playlist_id` via the Protocol Client, partition its tracks
    /// into {already_downloaded, already_queued, new}, and enqueue only the
    /// new set directly as `queued` (spec §4.8 `preview`).
    pub async fn preview(&self, playlist_id: &str, quality: Quality) -> CoreResult<EnqueueOutcome> {
        let candidates = self.client.resolve_playlist(playlist_id).await?;

        let already_downloaded: HashSet<String> = self
            .store
            .finished_track_ids_for_playlist(playlist_id)
            .await?
            .into_iter()
            .collect();
        let already_queued: HashSet<String> = self
            .store
            .queued_track_ids_for_playlist(playlist_id)
            .await?
            .into_iter()
            .collect();

        let mut outcome = EnqueueOutcome::default();
        let mut new_batch = Vec::new();
        for track in candidates {
            if already_downloaded.contains(&track.track_id) {
                outcome.skipped += 1;
            } else if already_queued.contains(&track.track_id) {
                outcome.duplicates += 1;
            } else {
                new_batch.push(track);
            }
        }

        let added = self.store.enqueue(&new_batch, quality, Status::Queued).await?;
        outcome.added = added.added;
        Ok(outcome)
    }

    pub async fn get_queue(&self, limit: Option<u32>) -> CoreResult<Vec<QueueItem>> {
        self.store.get_queue(limit).await
    }

    /// Combines catalog counts with the worker's live flags (spec §4.8
    /// `get_stats`).
    pub async fn get_stats(&self) -> CoreResult<QueueStats> {
        let counts = self.store.get_counts().await?;
        Ok(crate::store::assemble_stats(
            counts,
            self.worker.is_running(),
            self.worker.is_paused(),
            self.worker.current_track_id().await,
        ))
    }

    pub async fn start(&self) -> CoreResult<()> {
        self.worker.start().await
    }

    pub async fn pause(&self) -> CoreResult<()> {
        self.worker.pause().await
    }

    pub async fn resume(&self) -> CoreResult<()> {
        self.worker.resume().await
    }

    pub async fn stop(&self) {
        self.worker.stop().await;
    }

    pub async fn restart(&self) -> CoreResult<()> {
        self.worker.restart().await
    }

    pub async fn clear(&self, scope: ClearScope) -> CoreResult<u64> {
        self.store.clear(scope).await
    }

    pub async fn remove_selected(&self, ids: &[i64]) -> CoreResult<u64> {
        self.store.remove_selected(ids).await
    }

    pub async fn change_status(&self, from: Status, to: Status, limit: Option<u32>) -> CoreResult<u64> {
        self.store.change_status(from, to, limit).await
    }

    /// Verify every finished row's file still exists, pruning rows whose
    /// artifact has vanished (spec §4.1/R1/I4).
    pub async fn sweep(&self) -> CoreResult<(u64, u64, u64, u64)> {
        self.store.sweep_missing().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Credential;
    use std::path::PathBuf;

    async fn build_controller() -> Controller {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let client = Arc::new(ProtocolClient::new(Credential::OAuth("t".into())).unwrap());
        let settings = EngineSettings {
            download_root: PathBuf::from("/tmp/yamuse-dl-test"),
            file_template: "{artist} - {title}".into(),
            folder_structure: "{artist}/{album}".into(),
        };
        Controller::new(store, client, settings)
    }

    fn track(id: &str, playlist: &str) -> TrackRequest {
        TrackRequest {
            track_id: id.into(),
            title: "title".into(),
            artist: "artist".into(),
            album: "album".into(),
            playlist: playlist.into(),
            cover_url: None,
        }
    }

    #[tokio::test]
    async fn add_tracks_then_stats_reflects_pending_count() {
        let controller = build_controller().await;
        let outcome = controller
            .add_tracks(&[track("1", "P1"), track("2", "P1")], Quality::Lossless, false)
            .await
            .unwrap();
        assert_eq!(outcome.added, 2);

        let stats = controller.get_stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert!(!stats.running);
    }

    #[tokio::test]
    async fn add_tracks_with_clear_previous_drops_pending_rows_first() {
        let controller = build_controller().await;
        controller.add_one(track("1", "P1"), Quality::Lossless).await.unwrap();
        let outcome = controller
            .add_tracks(&[track("2", "P1")], Quality::Lossless, true)
            .await
            .unwrap();
        assert_eq!(outcome.cleared, 1);
        assert_eq!(outcome.added, 1);

        let queue = controller.get_queue(None).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].track_id, "2");
    }

    #[tokio::test]
    async fn duplicate_across_playlists_is_not_a_duplicate() {
        let controller = build_controller().await;
        controller.add_one(track("9", "P1"), Quality::Lossless).await.unwrap();
        let outcome = controller.add_one(track("9", "P2"), Quality::Lossless).await.unwrap();
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.duplicates, 0);
    }

    #[tokio::test]
    async fn re_adding_same_pending_item_is_a_duplicate() {
        let controller = build_controller().await;
        controller.add_one(track("9", "P1"), Quality::Lossless).await.unwrap();
        let outcome = controller.add_one(track("9", "P1"), Quality::Lossless).await.unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.duplicates, 1);
    }

    #[tokio::test]
    async fn clear_completed_scope_only_removes_completed() {
        let controller = build_controller().await;
        controller.add_one(track("1", "P1"), Quality::Lossless).await.unwrap();
        let removed = controller.clear(ClearScope::Completed).await.unwrap();
        assert_eq!(removed, 0);
        let stats = controller.get_stats().await.unwrap();
        assert_eq!(stats.pending, 1);
    }
}
