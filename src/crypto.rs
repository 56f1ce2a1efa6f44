use std::path::{Path, PathBuf};
use std::time::Duration;

use aes::Aes128;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;

type Aes128Ctr = Ctr128BE<Aes128>;

const REMUX_TIMEOUT_LOCAL: Duration = Duration::from_secs(60);
const REMUX_TIMEOUT_NETWORK: Duration = Duration::from_secs(120);

/// Decrypt an `encraw`-transport payload: AES-128-CTR with a zero 128-bit
/// initial counter (spec §4.3). `key` must be exactly 16 bytes.
pub fn decrypt_encraw(ciphertext: &[u8], key: &[u8; 16]) -> Vec<u8> {
    // The zero IV is intentional: the remote service derives the key per
    // request, so a fixed counter never repeats under the same key.
    let mut cipher = Aes128Ctr::new(key.into(), &[0u8; 16].into());
    let mut buf = ciphertext.to_vec();
    cipher.apply_keystream(&mut buf);
    buf
}

/// Parse a hex-encoded AES-128 key, failing fatally on anything but 16 bytes
/// (spec §4.3 "bad hex length is fatal for this attempt").
pub fn parse_key_hex(hex_key: &str) -> Result<[u8; 16], CoreError> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| CoreError::Crypto(format!("invalid hex key: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| CoreError::Crypto(format!("key is {} bytes, expected 16", b.len())))
}

/// Whether `path` resides on what looks like a remote mount: a leading
/// `//host/...` UNC-style prefix, or a `name:` first segment that is not a
/// single-letter drive (spec §4.3 network-filesystem policy).
pub fn looks_like_network_mount(path: &Path) -> bool {
    let s = path.to_string_lossy();
    if s.starts_with("//") || s.starts_with("\\\\") {
        return true;
    }
    if let Some(first) = s.split(['/', '\\']).next() {
        if let Some(idx) = first.find(':') {
            return idx != 1;
        }
    }
    false
}

/// Invoke the external transcoder to remux an MP4-wrapped lossless stream
/// into a bare FLAC file with stream copy (no re-encoding). Timeout is 120s
/// on a network filesystem, 60s otherwise (spec §4.3).
pub async fn remux_to_flac(
    input: &Path,
    output: &Path,
    on_network_fs: bool,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    let budget = if on_network_fs {
        REMUX_TIMEOUT_NETWORK
    } else {
        REMUX_TIMEOUT_LOCAL
    };

    let mut child = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-c:a")
        .arg("copy")
        .arg(output)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CoreError::Remux(format!("failed to spawn ffmpeg: {e}")))?;

    let wait = async {
        tokio::select! {
            status = child.wait() => status.map_err(|e| CoreError::Remux(e.to_string())),
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                Err(CoreError::Canceled)
            }
        }
    };

    match timeout(budget, wait).await {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(CoreError::Remux(format!(
            "ffmpeg exited with {status}"
        ))),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!(?input, "ffmpeg remux timed out");
            Err(CoreError::Remux("transcoder timed out".into()))
        }
    }
}

/// Atomically publish `staged` at `dest`. Retries up to 3 times with a 2s
/// backoff on permission/OS errors (spec §4.3); on exhausted retries the
/// staged file is left in place for manual recovery.
pub async fn atomic_publish(staged: &Path, dest: &Path) -> Result<(), CoreError> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match tokio::fs::rename(staged, dest).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!(attempt, error = %e, "atomic rename failed, retrying");
                last_err = Some(e);
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
    Err(CoreError::Filesystem(last_err.unwrap()))
}

/// Best-effort cleanup of staging files; never raises (spec §4.3).
pub async fn cleanup_staging(paths: &[&Path]) {
    for p in paths {
        if let Err(e) = tokio::fs::remove_file(p).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = ?p, error = %e, "could not remove staging file");
            }
        }
    }
}

/// Sweep a directory tree for orphaned `.encrypted`/`.decrypted.mp4` staging
/// files left behind by a crashed run, deleting any whose path is not in
/// `active`. Mirrors the reference implementation's `fix_encrypted_files.py`
/// recovery sweep.
pub async fn sweep_orphan_staging(
    root: &Path,
    active: &[PathBuf],
) -> Result<u64, CoreError> {
    let mut deleted = 0u64;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(_) => continue,
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let name = path.to_string_lossy();
            let is_staging = name.ends_with(".encrypted") || name.ends_with(".decrypted.mp4");
            if is_staging && !active.contains(&path) {
                if tokio::fs::remove_file(&path).await.is_ok() {
                    deleted += 1;
                }
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_is_its_own_inverse_under_same_key() {
        let key = [0x11u8; 16];
        let plaintext = b"hello mp4 payload, padded to more than one block-----------";
        let ciphertext = decrypt_encraw(plaintext, &key);
        let roundtrip = decrypt_encraw(&ciphertext, &key);
        assert_eq!(roundtrip, plaintext);
    }

    #[test]
    fn rejects_short_hex_key() {
        assert!(parse_key_hex("aabb").is_err());
    }

    #[test]
    fn rejects_17_byte_hex_key() {
        assert!(parse_key_hex("00112233445566778899aabbccddeeff00").is_err());
    }

    #[test]
    fn accepts_16_byte_hex_key() {
        assert!(parse_key_hex("000102030405060708090a0b0c0d0e0f").is_ok());
    }

    #[test]
    fn detects_network_mount_by_unc_prefix() {
        assert!(looks_like_network_mount(Path::new("//nas/music/a.flac")));
        assert!(!looks_like_network_mount(Path::new("/home/user/music/a.flac")));
    }
}
