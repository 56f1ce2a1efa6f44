use std::time::Duration;

use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::models::{Codec, FormatDescriptor, Quality, Transport, TrackMetadata, TrackRequest};
use crate::signing::{sign_request, CODECS_LITERAL, TRANSPORTS_LITERAL};

const API_BASE: &str = "https://api.music.yandex.net";
const CHUNK_SIZE_HINT: usize = 64 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_CHUNK_RETRIES: u32 = 3;
const CHUNK_RETRY_BASE: Duration = Duration::from_secs(2);
const PROGRESS_THROTTLE: Duration = Duration::from_millis(100);

/// HMAC secret baked into the desktop client, reverse-engineered from the
/// reference implementation. Subject to periodic update by the remote
/// service operator (spec §9 open question).
const SIGNING_SECRET: &str = "kzqU4XhfCaY6B6JTHODeq5";

/// `X-...-Client` identifiers the remote service currently accepts. Treated
/// as a constant, not a configuration key (spec §9).
const CLIENT_HEADER_OAUTH: &str = "YandexMusicDesktopAppWindows/5.23.2";
const CLIENT_HEADER_WEB: &str = "YandexMusicWebNext/1.0.0";

/// Credential accepted by the remote service: either an OAuth bearer token
/// or a long-lived session cookie (spec §4.2).
#[derive(Debug, Clone)]
pub enum Credential {
    OAuth(String),
    SessionCookie(String),
}

/// One authenticated HTTP session per credential (spec §4.2/§5: credentials
/// must not be shared across `ProtocolClient` instances).
pub struct ProtocolClient {
    http: HttpClient,
    credential: Credential,
}

impl ProtocolClient {
    pub fn new(credential: Credential) -> CoreResult<Self> {
        let mut builder = HttpClient::builder()
            .user_agent(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/141.0.0.0 Safari/537.36",
            )
            .connect_timeout(CONNECT_TIMEOUT);

        if let Credential::SessionCookie(_) = &credential {
            builder = builder.cookie_store(true);
        }

        let http = builder
            .build()
            .map_err(|e| CoreError::Auth(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, credential })
    }

    fn auth_headers(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Credential::OAuth(token) => request
                .header("Authorization", format!("OAuth {token}"))
                .header("X-Yandex-Music-Client", CLIENT_HEADER_OAUTH),
            Credential::SessionCookie(token) => request
                .header("Cookie", format!("Session_id={token}"))
                .header("x-requested-with", "XMLHttpRequest")
                .header("x-retpath-y", "https://music.yandex.ru/")
                .header("x-yandex-music-client", CLIENT_HEADER_WEB)
                .header("x-yandex-music-without-invocation-info", "1"),
        }
    }

    /// Resolve track metadata (spec §4.6 step 1). The wire protocol does not
    /// expose a dedicated metadata endpoint in the signature this client
    /// speaks; callers that already hold track attributes (title/artist/
    /// album from a playlist listing) pass them straight through to
    /// `TrackMetadata` instead. Kept for symmetry with the download engine's
    /// contract and as the extension point for a richer metadata lookup.
    pub fn track_metadata_passthrough(
        title: &str,
        artist: &str,
        album: &str,
    ) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            ..Default::default()
        }
    }

    /// The signed `/get-file-info` request (spec §4.2): fetch every format
    /// descriptor the remote service offers for `track_id` at `quality`.
    pub async fn get_file_info(
        &self,
        track_id: &str,
        quality: Quality,
    ) -> CoreResult<Vec<FormatDescriptor>> {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| CoreError::Wire(format!("clock error: {e}")))?
            .as_secs();

        let sign = sign_request(ts, track_id, quality.as_str(), SIGNING_SECRET);

        let request = self.auth_headers(self.http.get(format!("{API_BASE}/get-file-info"))).query(&[
            ("ts", ts.to_string()),
            ("trackId", track_id.to_string()),
            ("quality", quality.as_str().to_string()),
            ("codecs", CODECS_LITERAL.to_string()),
            ("transports", TRANSPORTS_LITERAL.to_string()),
            ("sign", sign),
        ]);

        let resp = request
            .send()
            .await
            .map_err(CoreError::Network)?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::Wire(format!(
                "get-file-info returned HTTP {status}: {body}"
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::Wire(format!("malformed JSON: {e}")))?;

        parse_format_response(&body)
    }

    /// Resolve a `downloadInfoUrl` pointer to a direct download link by
    /// fetching its XML redirect document (spec §4.2).
    pub async fn resolve_direct_link(&self, download_info_url: &str) -> CoreResult<String> {
        let resp = self
            .http
            .get(download_info_url)
            .timeout(CONNECT_TIMEOUT)
            .send()
            .await
            .map_err(CoreError::Network)?;

        if resp.status() != StatusCode::OK {
            return Err(CoreError::Wire(format!(
                "direct-link resolution returned HTTP {}",
                resp.status()
            )));
        }

        let xml = resp
            .text()
            .await
            .map_err(|e| CoreError::Wire(format!("failed to read direct-link body: {e}")))?;

        parse_direct_link_xml(&xml)
    }

    /// Resolve a playlist's track listing (spec §4.8 `preview`). The signed
    /// wire protocol this client speaks has no documented playlist-listing
    /// shape (spec §9 open question); this mirrors the reference
    /// implementation's `users_playlists(...).fetch_tracks()` call by
    /// hitting the equivalent REST listing and normalising its track array.
    pub async fn resolve_playlist(&self, playlist_id: &str) -> CoreResult<Vec<TrackRequest>> {
        let request = self
            .auth_headers(self.http.get(format!("{API_BASE}/playlists/{playlist_id}")));

        let resp = request.send().await.map_err(CoreError::Network)?;
        if resp.status() != StatusCode::OK {
            return Err(CoreError::Wire(format!(
                "playlist lookup returned HTTP {}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::Wire(format!("malformed playlist JSON: {e}")))?;

        parse_playlist_response(&body, playlist_id)
    }

    /// Stream `url`'s bytes in ~64 KiB chunks with retry on transient
    /// network/protocol errors (spec §4.2/§5). `progress` receives
    /// `(downloaded, total)` throttled to at most once per 100ms;
    /// `cancel` is checked between chunks. A retried attempt re-issues the
    /// whole-object GET, so `sink` is rewound and truncated to empty first —
    /// otherwise the bytes a failed attempt already wrote would survive
    /// underneath the retry's output and corrupt the staging file. Takes a
    /// concrete `tokio::fs::File` (rather than a generic `AsyncWrite`) since
    /// truncation needs `set_len`.
    pub async fn stream_to(
        &self,
        url: &str,
        sink: &mut tokio::fs::File,
        progress: Option<mpsc::Sender<(u64, u64)>>,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        use futures::StreamExt;
        use tokio::io::{AsyncSeekExt, AsyncWriteExt};

        let mut attempt = 0u32;
        let mut backoff = CHUNK_RETRY_BASE;

        loop {
            let resp = self
                .http
                .get(url)
                .timeout(READ_TIMEOUT)
                .send()
                .await
                .map_err(CoreError::Network)?;

            if !resp.status().is_success() {
                return Err(CoreError::Wire(format!(
                    "byte fetch returned HTTP {}",
                    resp.status()
                )));
            }

            let total = resp.content_length().unwrap_or(0);
            let mut downloaded = 0u64;
            let mut last_report = tokio::time::Instant::now() - PROGRESS_THROTTLE;
            let mut stream = resp.bytes_stream();
            let mut retry_needed = false;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(CoreError::Canceled),
                    chunk = stream.next() => {
                        match chunk {
                            None => break,
                            Some(Ok(bytes)) => {
                                sink.write_all(&bytes)
                                    .await
                                    .map_err(CoreError::Filesystem)?;
                                downloaded += bytes.len() as u64;

                                if let Some(tx) = &progress {
                                    let now = tokio::time::Instant::now();
                                    if now.duration_since(last_report) >= PROGRESS_THROTTLE {
                                        last_report = now;
                                        let _ = tx.try_send((downloaded, total));
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                attempt += 1;
                                if attempt > MAX_CHUNK_RETRIES {
                                    return Err(CoreError::Network(e));
                                }
                                warn!(attempt, error = %e, "chunked read failed, retrying");
                                tokio::time::sleep(backoff).await;
                                backoff *= 2;
                                retry_needed = true;
                                break;
                            }
                        }
                    }
                }
            }

            if retry_needed {
                sink.rewind().await.map_err(CoreError::Filesystem)?;
                sink.set_len(0).await.map_err(CoreError::Filesystem)?;
                continue;
            }

            sink.flush().await.map_err(CoreError::Filesystem)?;
            let _ = CHUNK_SIZE_HINT;
            return Ok(());
        }
    }

    /// Format selection policy given the requested quality (spec §4.2).
    /// Tie-break across equals: prefer `raw` transport, then highest
    /// bitrate, then first in listing.
    pub fn select_format(
        descriptors: &[FormatDescriptor],
        quality: Quality,
    ) -> CoreResult<&FormatDescriptor> {
        select_format_impl(descriptors, quality).ok_or(CoreError::NoSuitableFormat)
    }
}

fn select_format_impl(
    descriptors: &[FormatDescriptor],
    quality: Quality,
) -> Option<&FormatDescriptor> {
    // Highest bitrate wins; `raw` transport only breaks a tie between equal
    // bitrates (spec §4.2 — the "prefer raw" rule applies across equals, not
    // ahead of bitrate).
    let better = |a: &&FormatDescriptor, b: &&FormatDescriptor| -> std::cmp::Ordering {
        let raw_rank = |d: &FormatDescriptor| matches!(d.transport, Transport::Raw) as u8;
        b.bitrate_kbps
            .cmp(&a.bitrate_kbps)
            .then(raw_rank(b).cmp(&raw_rank(a)))
    };

    match quality {
        Quality::Lossless => {
            let lossless: Vec<&FormatDescriptor> =
                descriptors.iter().filter(|d| d.codec.is_lossless()).collect();
            if let Some(best) = best_of(&lossless, better) {
                return Some(best);
            }

            let aac_hi: Vec<&FormatDescriptor> = descriptors
                .iter()
                .filter(|d| {
                    matches!(d.codec, Codec::AacMp4 | Codec::Aac | Codec::HeAacMp4)
                        && d.bitrate_kbps >= 256
                })
                .collect();
            if let Some(best) = best_of(&aac_hi, better) {
                return Some(best);
            }

            best_of(&descriptors.iter().collect::<Vec<_>>(), better)
        }
        Quality::Hq => {
            let aac: Vec<&FormatDescriptor> =
                descriptors.iter().filter(|d| matches!(d.codec, Codec::Aac)).collect();
            if let Some(best) = best_of(&aac, better) {
                return Some(best);
            }
            let mp3: Vec<&FormatDescriptor> =
                descriptors.iter().filter(|d| matches!(d.codec, Codec::Mp3)).collect();
            best_of(&mp3, better)
        }
        Quality::Nq => {
            let mp3: Vec<&FormatDescriptor> =
                descriptors.iter().filter(|d| matches!(d.codec, Codec::Mp3)).collect();
            if let Some(lowest) = mp3
                .iter()
                .min_by(|a, b| a.bitrate_kbps.cmp(&b.bitrate_kbps))
                .copied()
            {
                return Some(lowest);
            }
            best_of(&descriptors.iter().collect::<Vec<_>>(), better)
        }
    }
}

fn best_of<'a>(
    candidates: &[&'a FormatDescriptor],
    cmp: impl Fn(&&FormatDescriptor, &&FormatDescriptor) -> std::cmp::Ordering,
) -> Option<&'a FormatDescriptor> {
    candidates.iter().copied().min_by(cmp)
}

/// Normalise every response shape `/get-file-info` can produce (spec §4.2/
/// §9): a top-level list, `{result:{downloadInfo:...}}`, `{result:[...]}`,
/// `{result:<descriptor>}`, or a bare descriptor.
fn parse_format_response(body: &Value) -> CoreResult<Vec<FormatDescriptor>> {
    let items: Vec<&Value> = if let Some(list) = body.as_array() {
        list.iter().collect()
    } else if let Some(result) = body.get("result") {
        if let Some(download_info) = result.get("downloadInfo") {
            vec![download_info]
        } else if let Some(list) = result.as_array() {
            list.iter().collect()
        } else if result.is_object() {
            vec![result]
        } else {
            return Err(CoreError::Wire("unrecognised `result` shape".into()));
        }
    } else if let Some(download_info) = body.get("downloadInfo") {
        vec![download_info]
    } else if body.is_object() {
        vec![body]
    } else {
        return Err(CoreError::Wire("unrecognised get-file-info response".into()));
    };

    let descriptors: Vec<FormatDescriptor> = items
        .into_iter()
        .filter_map(parse_descriptor)
        .map(reconcile_flac_misreport)
        .collect();

    if descriptors.is_empty() {
        return Err(CoreError::Wire("no format descriptors in response".into()));
    }

    Ok(descriptors)
}

#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    codec: Option<String>,
    #[serde(rename = "codecName", default)]
    codec_name: Option<String>,
    #[serde(rename = "bitrateInKbps", default)]
    bitrate_in_kbps: Option<u32>,
    #[serde(default)]
    bitrate: Option<u32>,
    #[serde(default)]
    transport: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "downloadInfoUrl", default)]
    download_info_url: Option<String>,
}

fn parse_descriptor(value: &Value) -> Option<FormatDescriptor> {
    let raw: RawDescriptor = serde_json::from_value(value.clone()).ok()?;

    let codec_str = raw.codec.or(raw.codec_name).unwrap_or_default();
    let codec = Codec::parse(&codec_str.to_lowercase())?;
    let bitrate_kbps = raw.bitrate_in_kbps.or(raw.bitrate).unwrap_or(0);
    let transport = raw
        .transport
        .as_deref()
        .and_then(Transport::parse)
        .unwrap_or(Transport::Raw);

    let key = match &raw.key {
        Some(hex_key) if !hex_key.is_empty() => {
            crate::crypto::parse_key_hex(hex_key).ok()
        }
        _ => None,
    };

    Some(FormatDescriptor {
        codec,
        bitrate_kbps,
        transport,
        key,
        direct_link: raw.url.filter(|u| u.starts_with("https://strm")),
        download_info_url: raw.download_info_url,
    })
}

/// A descriptor whose text anywhere contains `flac` but whose reported codec
/// differs is treated as `flac` (spec §4.2).
fn reconcile_flac_misreport(mut descriptor: FormatDescriptor) -> FormatDescriptor {
    if descriptor.codec.is_lossless() {
        return descriptor;
    }
    let mentions_flac = descriptor
        .direct_link
        .as_deref()
        .is_some_and(|s| s.to_lowercase().contains("flac"))
        || descriptor
            .download_info_url
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains("flac"));
    if mentions_flac {
        debug!("reconciling codec mismatch: URL mentions flac, reported codec did not");
        descriptor.codec = Codec::Flac;
    }
    descriptor
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
struct DirectLinkXml {
    host: String,
    path: String,
    ts: String,
    s: String,
}

/// Synthesize `https://{host}/get-mp3/{s}/{ts}{path}` from the XML redirect
/// document (spec §4.2).
fn parse_direct_link_xml(xml: &str) -> CoreResult<String> {
    let doc: DirectLinkXml = quick_xml::de::from_str(xml)
        .map_err(|e| CoreError::Wire(format!("malformed direct-link XML: {e}")))?;
    Ok(format!(
        "https://{}/get-mp3/{}/{}{}",
        doc.host, doc.s, doc.ts, doc.path
    ))
}

#[derive(Deserialize)]
struct RawPlaylistTrack {
    #[serde(rename = "trackId", alias = "id", default)]
    track_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(rename = "coverUrl", default)]
    cover_url: Option<String>,
}

/// Normalise a playlist listing response into `TrackRequest`s tagged with
/// `playlist_id`. Accepts either a top-level array or `{tracks: [...]}`,
/// matching the tolerant-shape convention `parse_format_response` already
/// applies to `/get-file-info`.
fn parse_playlist_response(body: &Value, playlist_id: &str) -> CoreResult<Vec<TrackRequest>> {
    let items: Vec<&Value> = if let Some(list) = body.as_array() {
        list.iter().collect()
    } else if let Some(list) = body.get("tracks").and_then(|t| t.as_array()) {
        list.iter().collect()
    } else {
        return Err(CoreError::Wire("unrecognised playlist response shape".into()));
    };

    let tracks: Vec<TrackRequest> = items
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawPlaylistTrack>(v.clone()).ok())
        .filter_map(|raw| {
            Some(TrackRequest {
                track_id: raw.track_id?,
                title: raw.title.unwrap_or_default(),
                artist: raw.artist.unwrap_or_default(),
                album: raw.album.unwrap_or_default(),
                playlist: playlist_id.to_string(),
                cover_url: raw.cover_url,
            })
        })
        .collect();

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Codec, Transport};

    fn descriptor(codec: Codec, bitrate: u32, transport: Transport) -> FormatDescriptor {
        FormatDescriptor {
            codec,
            bitrate_kbps: bitrate,
            transport,
            key: None,
            direct_link: Some("https://strm.example/x".into()),
            download_info_url: None,
        }
    }

    #[test]
    fn lossless_prefers_flac() {
        let formats = vec![
            descriptor(Codec::AacMp4, 256, Transport::Encraw),
            descriptor(Codec::FlacMp4, 1411, Transport::Encraw),
        ];
        let chosen = ProtocolClient::select_format(&formats, Quality::Lossless).unwrap();
        assert_eq!(chosen.codec, Codec::FlacMp4);
    }

    #[test]
    fn lossless_falls_back_to_high_bitrate_aac() {
        let formats = vec![
            descriptor(Codec::Mp3, 128, Transport::Raw),
            descriptor(Codec::AacMp4, 256, Transport::Encraw),
        ];
        let chosen = ProtocolClient::select_format(&formats, Quality::Lossless).unwrap();
        assert_eq!(chosen.codec, Codec::AacMp4);
    }

    #[test]
    fn lossless_requested_only_mp3_320_available() {
        let formats = vec![descriptor(Codec::Mp3, 320, Transport::Raw)];
        let chosen = ProtocolClient::select_format(&formats, Quality::Lossless).unwrap();
        assert_eq!(chosen.codec, Codec::Mp3);
        assert_eq!(chosen.bitrate_kbps, 320);
    }

    #[test]
    fn hq_prefers_aac_then_mp3() {
        let formats = vec![
            descriptor(Codec::Mp3, 320, Transport::Raw),
            descriptor(Codec::Aac, 256, Transport::Raw),
        ];
        assert_eq!(
            ProtocolClient::select_format(&formats, Quality::Hq).unwrap().codec,
            Codec::Aac
        );
    }

    #[test]
    fn nq_prefers_lowest_bitrate_mp3() {
        let formats = vec![
            descriptor(Codec::Mp3, 320, Transport::Raw),
            descriptor(Codec::Mp3, 128, Transport::Raw),
        ];
        let chosen = ProtocolClient::select_format(&formats, Quality::Nq).unwrap();
        assert_eq!(chosen.bitrate_kbps, 128);
    }

    #[test]
    fn tie_break_prefers_raw_transport() {
        let formats = vec![
            descriptor(Codec::Flac, 1411, Transport::Encraw),
            descriptor(Codec::Flac, 1411, Transport::Raw),
        ];
        let chosen = ProtocolClient::select_format(&formats, Quality::Lossless).unwrap();
        assert_eq!(chosen.transport, Transport::Raw);
    }

    #[test]
    fn lossless_aac_fallback_is_bitrate_primary_over_raw() {
        let formats = vec![
            descriptor(Codec::AacMp4, 256, Transport::Raw),
            descriptor(Codec::AacMp4, 320, Transport::Encraw),
        ];
        let chosen = ProtocolClient::select_format(&formats, Quality::Lossless).unwrap();
        assert_eq!(chosen.bitrate_kbps, 320);
        assert_eq!(chosen.transport, Transport::Encraw);
    }

    #[test]
    fn hq_aac_pick_is_bitrate_primary_over_raw() {
        let formats = vec![
            descriptor(Codec::Aac, 192, Transport::Raw),
            descriptor(Codec::Aac, 256, Transport::Encraw),
        ];
        let chosen = ProtocolClient::select_format(&formats, Quality::Hq).unwrap();
        assert_eq!(chosen.bitrate_kbps, 256);
        assert_eq!(chosen.transport, Transport::Encraw);
    }

    #[test]
    fn no_suitable_format_is_an_error() {
        let formats: Vec<FormatDescriptor> = vec![];
        assert!(ProtocolClient::select_format(&formats, Quality::Lossless).is_err());
    }

    #[test]
    fn parses_top_level_list_response() {
        let body: Value = serde_json::from_str(
            r#"[{"codec":"mp3","bitrateInKbps":320,"transport":"raw","url":"https://strm.x/a"}]"#,
        )
        .unwrap();
        let formats = parse_format_response(&body).unwrap();
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].codec, Codec::Mp3);
    }

    #[test]
    fn parses_result_download_info_shape() {
        let body: Value = serde_json::from_str(
            r#"{"result":{"downloadInfo":{"codec":"flac","bitrateInKbps":1411,"transport":"encraw","url":"https://strm.x/b"}}}"#,
        )
        .unwrap();
        let formats = parse_format_response(&body).unwrap();
        assert_eq!(formats[0].codec, Codec::Flac);
    }

    #[test]
    fn parses_result_list_shape() {
        let body: Value = serde_json::from_str(
            r#"{"result":[{"codec":"aac","bitrateInKbps":256,"transport":"raw","url":"https://strm.x/c"}]}"#,
        )
        .unwrap();
        let formats = parse_format_response(&body).unwrap();
        assert_eq!(formats[0].codec, Codec::Aac);
    }

    #[test]
    fn parses_bare_descriptor_shape() {
        let body: Value = serde_json::from_str(
            r#"{"codec":"mp3","bitrateInKbps":192,"transport":"raw","url":"https://strm.x/d"}"#,
        )
        .unwrap();
        let formats = parse_format_response(&body).unwrap();
        assert_eq!(formats[0].codec, Codec::Mp3);
    }

    #[test]
    fn reconciles_flac_misreport_from_url() {
        let mut d = descriptor(Codec::Mp3, 320, Transport::Raw);
        d.direct_link = Some("https://strm.example/song.flac".into());
        let reconciled = reconcile_flac_misreport(d);
        assert_eq!(reconciled.codec, Codec::Flac);
    }

    #[test]
    fn parses_playlist_top_level_array() {
        let body: Value = serde_json::from_str(
            r#"[{"trackId":"1","title":"A","artist":"B","album":"C"}]"#,
        )
        .unwrap();
        let tracks = parse_playlist_response(&body, "P1").unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].playlist, "P1");
        assert_eq!(tracks[0].track_id, "1");
    }

    #[test]
    fn parses_playlist_tracks_wrapper_shape() {
        let body: Value = serde_json::from_str(
            r#"{"tracks":[{"id":"42","title":"X","artist":"Y","album":"Z"}]}"#,
        )
        .unwrap();
        let tracks = parse_playlist_response(&body, "P2").unwrap();
        assert_eq!(tracks[0].track_id, "42");
    }

    #[test]
    fn direct_link_xml_synthesizes_url() {
        let xml = "<response><host>n1.example.net</host><path>/get-mp3-part</path>\
                   <ts>1700000000</ts><s>abc123</s></response>";
        let url = parse_direct_link_xml(xml).unwrap();
        assert_eq!(url, "https://n1.example.net/get-mp3/abc123/1700000000/get-mp3-part");
    }
}
