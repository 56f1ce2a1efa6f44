use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Probe a produced FLAC file's real sample rate and bit depth by reading its
/// format headers through `symphonia`'s FLAC reader — no frame decoding,
/// mirrors the probe-then-`codec_params` sequence
/// `examples/scred47-pleezer/src/decoder.rs::Decoder::new` uses to learn a
/// stream's sample rate ahead of playback. The catalog's quality string is a
/// display nicety, not a correctness gate, so any probe failure yields `None`
/// rather than failing the download (spec §4.6 step 9 is satisfied either
/// way — a conservative label is still recorded).
pub async fn probe_flac_quality(path: PathBuf) -> Option<(u32, u16)> {
    match tokio::task::spawn_blocking(move || probe_flac_quality_blocking(&path)).await {
        Ok(result) => result,
        Err(e) => {
            debug!(error = %e, "flac quality probe task panicked");
            None
        }
    }
}

fn probe_flac_quality_blocking(path: &Path) -> Option<(u32, u16)> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("flac");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .inspect_err(|e| debug!(error = %e, ?path, "flac quality probe failed"))
        .ok()?;

    let track = probed.format.default_track()?;
    let params = &track.codec_params;
    let sample_rate = params.sample_rate?;
    let bits_per_sample = params.bits_per_sample.unwrap_or(16) as u16;
    Some((sample_rate, bits_per_sample))
}
