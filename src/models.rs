use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User-facing quality tier, mapping onto a preference order over codecs (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Quality {
    Lossless,
    Hq,
    Nq,
}

pub const QUALITY_LOSSLESS: &str = "lossless";
pub const QUALITY_HQ: &str = "hq";
pub const QUALITY_NQ: &str = "nq";

impl Quality {
    /// Kept in sync with the `sqlx::Type` derive above.
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Lossless => QUALITY_LOSSLESS,
            Quality::Hq => QUALITY_HQ,
            Quality::Nq => QUALITY_NQ,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            QUALITY_LOSSLESS => Some(Quality::Lossless),
            QUALITY_HQ => Some(Quality::Hq),
            QUALITY_NQ => Some(Quality::Nq),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue item status lifecycle (spec §3): pending -> queued -> downloading ->
/// completed | error. `paused` is a worker-level flag, not a per-item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Status {
    Pending,
    Queued,
    Downloading,
    Completed,
    Error,
}

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_DOWNLOADING: &str = "downloading";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_ERROR: &str = "error";

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => STATUS_PENDING,
            Status::Queued => STATUS_QUEUED,
            Status::Downloading => STATUS_DOWNLOADING,
            Status::Completed => STATUS_COMPLETED,
            Status::Error => STATUS_ERROR,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            STATUS_PENDING => Some(Status::Pending),
            STATUS_QUEUED => Some(Status::Queued),
            STATUS_DOWNLOADING => Some(Status::Downloading),
            STATUS_COMPLETED => Some(Status::Completed),
            STATUS_ERROR => Some(Status::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One encoding the remote service reported for a track (spec §3). Ephemeral:
/// valid for a single download attempt, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Codec {
    Flac,
    FlacMp4,
    Aac,
    AacMp4,
    HeAac,
    HeAacMp4,
    Mp3,
}

impl Codec {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "flac" => Some(Codec::Flac),
            "flac-mp4" => Some(Codec::FlacMp4),
            "aac" => Some(Codec::Aac),
            "aac-mp4" => Some(Codec::AacMp4),
            "he-aac" => Some(Codec::HeAac),
            "he-aac-mp4" => Some(Codec::HeAacMp4),
            "mp3" => Some(Codec::Mp3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Flac => "flac",
            Codec::FlacMp4 => "flac-mp4",
            Codec::Aac => "aac",
            Codec::AacMp4 => "aac-mp4",
            Codec::HeAac => "he-aac",
            Codec::HeAacMp4 => "he-aac-mp4",
            Codec::Mp3 => "mp3",
        }
    }

    pub fn is_mp4_wrapped(&self) -> bool {
        matches!(self, Codec::FlacMp4 | Codec::AacMp4 | Codec::HeAacMp4)
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, Codec::Flac | Codec::FlacMp4)
    }

    /// Catalog-facing format tag, e.g. `FLAC`/`MP3`/`AAC`.
    pub fn format_tag(&self) -> &'static str {
        match self {
            Codec::Flac | Codec::FlacMp4 => "FLAC",
            Codec::Aac | Codec::AacMp4 | Codec::HeAac | Codec::HeAacMp4 => "AAC",
            Codec::Mp3 => "MP3",
        }
    }

    /// File extension the finished artifact is written with, derived from
    /// the codec actually downloaded (spec §4.5), never from the template.
    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Flac | Codec::FlacMp4 => "flac",
            Codec::Aac | Codec::AacMp4 | Codec::HeAac | Codec::HeAacMp4 => "m4a",
            Codec::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Raw,
    Encraw,
}

impl Transport {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(Transport::Raw),
            "encraw" => Some(Transport::Encraw),
            _ => None,
        }
    }
}

/// One available encoding for a track as reported by the remote service
/// (spec §3). Normalises every response shape the wire protocol can produce.
#[derive(Debug, Clone)]
pub struct FormatDescriptor {
    pub codec: Codec,
    pub bitrate_kbps: u32,
    pub transport: Transport,
    /// 16-byte AES-128 key, present only when `transport == Encraw`.
    pub key: Option<[u8; 16]>,
    pub direct_link: Option<String>,
    pub download_info_url: Option<String>,
}

impl FormatDescriptor {
    /// Prefer a resolved direct link; callers resolve `download_info_url`
    /// through the XML redirect document otherwise (spec §4.2).
    pub fn has_resolvable_url(&self) -> bool {
        self.direct_link.is_some() || self.download_info_url.is_some()
    }
}

/// A work request (spec §3).
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: i64,
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub playlist: String,
    pub cover_url: Option<String>,
    pub quality: Quality,
    pub status: Status,
    pub progress: u8,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog entry for a completed artifact (spec §3). Identity is the
/// `(track_id, playlist)` pair; the same track id may recur under different
/// playlists.
#[derive(Debug, Clone)]
pub struct FinishedTrack {
    pub track_id: String,
    pub playlist: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub file_path: String,
    pub file_size_mib: f64,
    pub format: String,
    pub quality_string: String,
    pub cover: Option<Vec<u8>>,
    pub downloaded_at: DateTime<Utc>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub isrc: Option<String>,
    pub duration_secs: Option<i32>,
    pub version: Option<String>,
}

/// Resolved track metadata fetched from the remote service ahead of format
/// selection (spec §4.6 step 1). Not persisted on its own; it flows into
/// `FinishedTrack` once a download completes.
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: Option<i32>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub isrc: Option<String>,
    pub version: Option<String>,
    pub cover_url: Option<String>,
}

/// Result of `enqueue`/`add_tracks`/`preview` (spec §4.1/§4.8).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EnqueueOutcome {
    pub added: u32,
    pub skipped: u32,
    pub duplicates: u32,
    pub cleared: u32,
}

/// Aggregate worker/catalog snapshot (spec §4.8 `get_stats`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u32,
    pub queued: u32,
    pub downloading: u32,
    pub completed: u32,
    pub error: u32,
    pub running: bool,
    pub paused: bool,
    pub current_track_id: Option<String>,
    pub total_files: u64,
    pub total_size_mib: f64,
}

/// A single track request to enqueue, as provided by an external collaborator.
#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub playlist: String,
    pub cover_url: Option<String>,
}
