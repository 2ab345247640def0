use std::path::Path;
use std::process::Command;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{DubError, Result};

use super::probe::{check_ffmpeg, check_ffprobe, has_audio_stream};
use super::waveform::Waveform;

/// Turns audio files into [`Waveform`]s and back.
///
/// The detection, balancing and splicing stages only ever see a `Waveform`,
/// so they can be exercised with synthetic audio and no media tooling.
pub trait WaveformCodec {
    fn decode(&self, path: &Path) -> Result<Waveform>;

    fn encode(&self, waveform: &Waveform, path: &Path) -> Result<()>;
}

/// Reads and writes 16-bit PCM WAV directly with hound.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl WaveformCodec for WavCodec {
    fn decode(&self, path: &Path) -> Result<Waveform> {
        if !path.exists() {
            return Err(DubError::FileNotFound(path.display().to_string()));
        }

        let reader = WavReader::open(path).map_err(|e| {
            DubError::Decode(format!("Failed to open WAV file {}: {e}", path.display()))
        })?;
        let spec = reader.spec();

        debug!(
            "Reading WAV: {} Hz, {} channels, {} bits {:?}",
            spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
        );

        let samples = read_samples(reader, spec)?;
        Waveform::new(samples, spec.sample_rate, spec.channels)
    }

    fn encode(&self, waveform: &Waveform, path: &Path) -> Result<()> {
        let spec = WavSpec {
            channels: waveform.channels(),
            sample_rate: waveform.sample_rate(),
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(path, spec)
            .map_err(|e| DubError::Encoding(format!("Failed to create {}: {e}", path.display())))?;

        for &sample in waveform.samples() {
            writer
                .write_sample(sample)
                .map_err(|e| DubError::Encoding(format!("Failed to write sample: {e}")))?;
        }

        writer
            .finalize()
            .map_err(|e| DubError::Encoding(format!("Failed to finalize WAV: {e}")))?;

        Ok(())
    }
}

fn read_samples<R: std::io::Read>(reader: WavReader<R>, spec: WavSpec) -> Result<Vec<i16>> {
    let decode_err = |e: hound::Error| DubError::Decode(format!("Corrupt WAV sample: {e}"));

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
        (SampleFormat::Int, bits) if bits <= 32 => {
            let shift = bits as i32 - 16;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if shift >= 0 {
                            (v >> shift) as i16
                        } else {
                            (v << -shift) as i16
                        }
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_err)
        }
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
        (format, bits) => Err(DubError::Decode(format!(
            "Unsupported WAV sample format: {bits}-bit {format:?}"
        ))),
    }
}

/// Decodes any format ffmpeg understands and encodes by output extension.
///
/// Audio passes through a temporary 16-bit WAV file on both paths. The
/// source's sample rate and channel count are preserved.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    /// Bitrate for lossy outputs, e.g. `192k`.
    pub bitrate: String,
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self {
            bitrate: "192k".to_string(),
        }
    }
}

impl FfmpegCodec {
    pub fn new(bitrate: impl Into<String>) -> Self {
        Self {
            bitrate: bitrate.into(),
        }
    }
}

/// ffmpeg audio encoder for an output path, chosen by extension.
pub fn encoder_for(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "wav" => Ok("pcm_s16le"),
        "mp3" => Ok("libmp3lame"),
        "m4a" | "aac" => Ok("aac"),
        "ogg" | "opus" => Ok("libopus"),
        "flac" => Ok("flac"),
        other => Err(DubError::Encoding(format!(
            "No audio encoder for extension '{other}' ({})",
            path.display()
        ))),
    }
}

impl WaveformCodec for FfmpegCodec {
    fn decode(&self, path: &Path) -> Result<Waveform> {
        if !path.exists() {
            return Err(DubError::FileNotFound(path.display().to_string()));
        }
        check_ffmpeg()?;
        check_ffprobe()?;

        if !has_audio_stream(path)? {
            return Err(DubError::Decode(format!("{} has no audio stream", path.display())));
        }

        let scratch = TempDir::new()?;
        let wav_path = scratch.path().join("decoded.wav");

        info!("Decoding audio from {}", path.display());

        let output = Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-i"])
            .arg(path)
            .args(["-vn", "-map", "0:a:0", "-acodec", "pcm_s16le"])
            .arg(&wav_path)
            .output()
            .map_err(|e| DubError::Decode(format!("Failed to run FFmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Decode(format!(
                "FFmpeg could not decode {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        WavCodec.decode(&wav_path)
    }

    fn encode(&self, waveform: &Waveform, path: &Path) -> Result<()> {
        let encoder = encoder_for(path)?;
        if encoder == "pcm_s16le" {
            return WavCodec.encode(waveform, path);
        }
        check_ffmpeg()?;

        let scratch = TempDir::new()?;
        let wav_path = scratch.path().join("encode.wav");
        WavCodec.encode(waveform, &wav_path)?;

        debug!("Encoding {} with {}", path.display(), encoder);

        let output = Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-i"])
            .arg(&wav_path)
            .args(["-acodec", encoder, "-b:a", self.bitrate.as_str()])
            .arg(path)
            .output()
            .map_err(|e| DubError::Encoding(format!("Failed to run FFmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Encoding(format!(
                "FFmpeg could not encode {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        if !path.exists() {
            return Err(DubError::Encoding("Output file was not created".to_string()));
        }

        info!("Audio written to {}", path.display());
        Ok(())
    }
}
