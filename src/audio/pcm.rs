//! Raw PCM codec for the live-session wire format.
//!
//! The remote protocol carries headerless 16-bit little-endian PCM in both
//! directions (16 kHz mono outbound, 24 kHz mono inbound), so this is a
//! hand-rolled byte codec rather than a container-format decoder.

use tracing::warn;

/// Flatten i16 samples into little-endian bytes for transmission.
pub fn encode_frame(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decode headerless PCM16-LE bytes into normalized f32 samples, one
/// Vec per channel.
///
/// Samples are interleaved by channel in the byte stream and normalized
/// into [-1.0, 1.0] by dividing by 32768. A trailing odd byte or partial
/// interleave group is dropped with a warning, so every channel comes
/// back the same length.
pub fn decode_pcm16(bytes: &[u8], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels.max(1) as usize;

    if bytes.len() % 2 != 0 {
        warn!("PCM payload has odd length {}, dropping last byte", bytes.len());
    }

    let sample_count = bytes.len() / 2;
    let frames = sample_count / channels;
    // Only whole interleave groups; a partial trailing one would leave
    // the channel vectors at unequal lengths.
    let usable = frames * channels;
    if usable < sample_count {
        warn!(
            "PCM payload ends mid-frame, dropping {} trailing samples",
            sample_count - usable
        );
    }

    let mut out: Vec<Vec<f32>> = (0..channels)
        .map(|_| Vec::with_capacity(frames))
        .collect();

    for (i, pair) in bytes.chunks_exact(2).take(usable).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        out[i % channels].push(sample as f32 / 32768.0);
    }

    out
}

/// Decode mono PCM16-LE bytes into a single normalized sample buffer.
pub fn decode_pcm16_mono(bytes: &[u8]) -> Vec<f32> {
    decode_pcm16(bytes, 1).into_iter().next().unwrap_or_default()
}

/// Duration in seconds of a mono sample buffer at the given rate.
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}
