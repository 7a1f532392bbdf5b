// Canonical 44-byte WAV framing for raw PCM buffers.
//
// Layout: RIFF/WAVE, a 16-byte `fmt ` chunk with PCM format code 1, then a
// single `data` chunk holding the samples.

use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::io::Cursor;

use super::pcm;

/// Size of the canonical PCM WAV header
pub const WAV_HEADER_LEN: usize = 44;

/// PCM format code in the `fmt ` chunk
const FORMAT_PCM: u16 = 1;

/// Sample layout of a PCM buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Bits per sample (16 for everything the broker produces)
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// 16-bit mono at the given rate
    pub fn mono_16bit(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

impl Default for WavSpec {
    fn default() -> Self {
        // Live model output: 24kHz mono 16-bit
        Self::mono_16bit(24000)
    }
}

/// Build the 44-byte header for `data_len` bytes of PCM
pub fn header(data_len: u32, spec: WavSpec) -> [u8; WAV_HEADER_LEN] {
    let mut h = [0u8; WAV_HEADER_LEN];

    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(data_len.wrapping_add(36)).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");

    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    h[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    h[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&spec.byte_rate().to_le_bytes());
    h[32..34].copy_from_slice(&spec.block_align().to_le_bytes());
    h[34..36].copy_from_slice(&spec.bits_per_sample.to_le_bytes());

    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());

    h
}

/// Wrap raw PCM bytes in a WAV container
pub fn encode(pcm: &[u8], spec: WavSpec) -> Vec<u8> {
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(&header(pcm.len() as u32, spec));
    out.extend_from_slice(pcm);
    out
}

/// Quick check for a RIFF/WAVE prefix
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Read a 16-bit PCM WAV container, returning its spec and little-endian samples
///
/// Extra chunks (`LIST`, `fact`) are skipped by the reader.
pub fn decode(bytes: &[u8]) -> Result<(WavSpec, Vec<u8>)> {
    if !is_wav(bytes) {
        bail!("Not a RIFF/WAVE container");
    }

    let reader = WavReader::new(Cursor::new(bytes)).context("Invalid WAV container")?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!(
            "Expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample,
            spec.sample_format
        );
    }

    let samples: Vec<i16> = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read WAV samples")?;

    Ok((
        WavSpec {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
        },
        pcm::samples_to_bytes(&samples),
    ))
}
