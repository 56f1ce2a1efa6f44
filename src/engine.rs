use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ProtocolClient;
use crate::crypto;
use crate::error::{CoreError, CoreResult};
use crate::models::{Codec, FinishedTrack, Quality, QueueItem, Transport};
use crate::path::{self, PathAttributes};
use crate::store::Store;
use crate::tagging::{self, TagInput};

/// Settings the engine needs to compute a path and locate the download root
/// (spec §4.5/§4.6). Resolved by the caller from the Catalog Store's
/// `settings` table.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub download_root: PathBuf,
    pub file_template: String,
    pub folder_structure: String,
}

/// The per-item outcome forwarded to the worker for logging/stats.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub final_path: PathBuf,
    pub format_tag: &'static str,
    pub file_size_mib: f64,
    /// Cover art bytes fetched once during tagging (step 7) and reused for
    /// the catalog row (step 9) rather than fetched twice.
    pub cover: Option<Vec<u8>>,
}

/// Drives one `QueueItem` through resolve → select format → path → stream →
/// decrypt/remux → tag → publish → catalog (spec §4.6, the numbered
/// ten-step contract). Any failure is fatal for this attempt: the caller is
/// responsible for calling `set_status(Error, ...)` and proceeding to the
/// next item (spec §7 "C6 treats every error... as fatal for the current
/// item").
pub struct DownloadEngine {
    client: Arc<ProtocolClient>,
    store: Arc<Store>,
    settings: EngineSettings,
}

impl DownloadEngine {
    pub fn new(client: Arc<ProtocolClient>, store: Arc<Store>, settings: EngineSettings) -> Self {
        Self { client, store, settings }
    }

    pub fn download_root(&self) -> &Path {
        &self.settings.download_root
    }

    pub async fn run(
        &self,
        item: &QueueItem,
        progress: mpsc::Sender<(u64, u64)>,
        cancel: &CancellationToken,
    ) -> CoreResult<DownloadOutcome> {
        // Step 1: track metadata. The signed wire protocol this client
        // speaks carries no separate metadata lookup; the attributes
        // already captured on the queue item at enqueue time (from the
        // playlist/track listing) stand in (spec §4.6 step 1, simplified —
        // see DESIGN.md).
        let metadata = ProtocolClient::track_metadata_passthrough(
            &item.title,
            &item.artist,
            &item.album,
        );

        // Step 2/3: format descriptors + selection, with quality downgrade
        // tracked via the chosen descriptor's actual codec.
        let descriptors = self.client.get_file_info(&item.track_id, item.quality).await?;
        let chosen = ProtocolClient::select_format(&descriptors, item.quality)?;
        let codec = chosen.codec.clone();

        if !matches_requested_quality(item.quality, &codec) {
            info!(
                track_id = %item.track_id,
                requested = %item.quality,
                effective = codec.format_tag(),
                "requested quality unavailable, downgrading effective format"
            );
        }

        // Step 4: path + parent directory.
        let attrs = PathAttributes {
            artist: &item.artist,
            title: &item.title,
            album: &item.album,
            year: metadata.year,
            track: None,
            playlist: &item.playlist,
        };
        let (final_path, parent) = path::build_path(
            &self.settings.download_root,
            &self.settings.folder_structure,
            &self.settings.file_template,
            &attrs,
            codec.extension(),
        );
        tokio::fs::create_dir_all(&parent).await.map_err(CoreError::Filesystem)?;

        let staging = final_path.with_extension(format!(
            "{}.tmp",
            final_path.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));

        let result = self
            .download_decrypt_remux_tag(
                chosen,
                &item.cover_url,
                &final_path,
                &staging,
                &metadata,
                progress,
                cancel,
            )
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                crypto::cleanup_staging(&[staging.as_path(), final_path.as_path()]).await;
                return Err(e);
            }
        };

        // Step 9: upsert into the finished table.
        let finished = FinishedTrack {
            track_id: item.track_id.clone(),
            playlist: item.playlist.clone(),
            title: item.title.clone(),
            artist: item.artist.clone(),
            album: item.album.clone(),
            file_path: outcome.final_path.to_string_lossy().to_string(),
            file_size_mib: outcome.file_size_mib,
            format: outcome.format_tag.to_string(),
            quality_string: quality_string_for(&codec, chosen.bitrate_kbps, &outcome.final_path).await,
            cover: outcome.cover.clone(),
            downloaded_at: Utc::now(),
            year: metadata.year,
            genre: metadata.genre.clone(),
            label: metadata.label.clone(),
            isrc: metadata.isrc.clone(),
            duration_secs: metadata.duration_secs,
            version: metadata.version.clone(),
        };
        self.store.finish_track(&finished).await?;

        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    async fn download_decrypt_remux_tag(
        &self,
        chosen: &crate::models::FormatDescriptor,
        cover_url: &Option<String>,
        final_path: &Path,
        staging: &Path,
        metadata: &crate::models::TrackMetadata,
        progress: mpsc::Sender<(u64, u64)>,
        cancel: &CancellationToken,
    ) -> CoreResult<DownloadOutcome> {
        let url = self.resolve_url(chosen).await?;

        // Step 5: stream into staging.
        let mut file = tokio::fs::File::create(staging)
            .await
            .map_err(CoreError::Filesystem)?;
        self.client
            .stream_to(&url, &mut file, Some(progress), cancel)
            .await?;

        let on_network_fs = crypto::looks_like_network_mount(final_path);

        // Step 6: decrypt + (conditionally) remux.
        let produced_path = if chosen.transport == Transport::Encraw {
            let key = chosen
                .key
                .ok_or_else(|| CoreError::Crypto("encraw transport without a key".into()))?;

            let ciphertext = tokio::fs::read(staging).await.map_err(CoreError::Filesystem)?;
            let plaintext = crypto::decrypt_encraw(&ciphertext, &key);

            let decrypted_path = staging.with_extension("decrypted.mp4");
            tokio::fs::write(&decrypted_path, &plaintext)
                .await
                .map_err(CoreError::Filesystem)?;
            tokio::fs::remove_file(staging).await.ok();

            if chosen.codec.is_lossless() {
                crypto::remux_to_flac(&decrypted_path, final_path, on_network_fs, cancel).await?;
                tokio::fs::remove_file(&decrypted_path).await.ok();
                final_path.to_path_buf()
            } else {
                // AAC-family: the decrypted MP4 *is* the final artifact,
                // renamed directly to `.m4a` (spec §4.6 step 6).
                crypto::atomic_publish(&decrypted_path, final_path).await?;
                final_path.to_path_buf()
            }
        } else {
            crypto::atomic_publish(staging, final_path).await?;
            final_path.to_path_buf()
        };

        // Step 7: tag (non-fatal on error). Fetched once here and reused for
        // the catalog row the caller builds from this outcome (spec §4.6
        // step 9 / §3 FinishedTrack.cover).
        let cover = fetch_cover_best_effort(cover_url).await;
        let tag_input = TagInput {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
            year: metadata.year,
            genre: metadata.genre.clone(),
            label: metadata.label.clone(),
            version: metadata.version.clone(),
            isrc: metadata.isrc.clone(),
            track_number: None,
            cover: cover.clone(),
        };
        tagging::tag_file_best_effort(&produced_path, &tag_input);

        let file_size = tokio::fs::metadata(&produced_path)
            .await
            .map_err(CoreError::Filesystem)?
            .len();

        Ok(DownloadOutcome {
            final_path: produced_path,
            format_tag: chosen.codec.format_tag(),
            file_size_mib: file_size as f64 / (1024.0 * 1024.0),
            cover,
        })
    }

    async fn resolve_url(&self, chosen: &crate::models::FormatDescriptor) -> CoreResult<String> {
        if let Some(direct) = &chosen.direct_link {
            return Ok(direct.clone());
        }
        if let Some(pointer) = &chosen.download_info_url {
            return self.client.resolve_direct_link(pointer).await;
        }
        Err(CoreError::Wire("descriptor has no resolvable URL".into()))
    }
}

fn matches_requested_quality(requested: Quality, codec: &Codec) -> bool {
    match requested {
        Quality::Lossless => codec.is_lossless(),
        Quality::Hq => matches!(codec, Codec::Aac | Codec::AacMp4 | Codec::HeAac | Codec::HeAacMp4),
        Quality::Nq => matches!(codec, Codec::Mp3),
    }
}

/// Catalog-facing quality string. The wire protocol reports bitrate but not
/// bit depth/sample rate for lossless content, so the produced FLAC's own
/// headers are probed for the real values; `16-bit/44.1kHz` is used only as
/// a fallback when the probe can't read the file (see DESIGN.md).
async fn quality_string_for(codec: &Codec, bitrate_kbps: u32, produced_path: &Path) -> String {
    if codec.is_lossless() {
        match crate::probe::probe_flac_quality(produced_path.to_path_buf()).await {
            Some((sample_rate, bits_per_sample)) => {
                format!("{bits_per_sample}-bit/{:.1}kHz", sample_rate as f64 / 1000.0)
            }
            None => "16-bit/44.1kHz".to_string(),
        }
    } else {
        format!("{bitrate_kbps}kbps/44.1kHz")
    }
}

async fn fetch_cover_best_effort(cover_url: &Option<String>) -> Option<Vec<u8>> {
    let url = cover_url.as_ref()?;
    match reqwest::get(url).await {
        Ok(resp) => match resp.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                debug!(error = %e, "failed reading cover bytes");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "failed fetching cover art");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lossy_quality_string_includes_bitrate() {
        assert_eq!(
            quality_string_for(&Codec::Mp3, 320, Path::new("/unused.mp3")).await,
            "320kbps/44.1kHz"
        );
    }

    #[tokio::test]
    async fn lossless_quality_string_falls_back_when_file_unreadable() {
        assert_eq!(
            quality_string_for(&Codec::Flac, 1411, Path::new("/nonexistent/does/not/exist.flac")).await,
            "16-bit/44.1kHz"
        );
    }

    #[test]
    fn requested_lossless_matches_flac_not_mp3() {
        assert!(matches_requested_quality(Quality::Lossless, &Codec::Flac));
        assert!(!matches_requested_quality(Quality::Lossless, &Codec::Mp3));
    }

    #[test]
    fn requested_nq_matches_only_mp3() {
        assert!(matches_requested_quality(Quality::Nq, &Codec::Mp3));
        assert!(!matches_requested_quality(Quality::Nq, &Codec::Aac));
    }
}
