pub mod codec;
pub mod probe;
pub mod silence;
pub mod waveform;

pub use codec::{FfmpegCodec, WavCodec, WaveformCodec};
pub use probe::{
    check_ffmpeg, check_ffprobe, get_media_duration, has_audio_stream, has_video_stream,
};
pub use silence::{detect, total_silence_ms, SilenceConfig};
pub use waveform::{frames_covering_ms, frames_for_ms, ms_for_frames, AudioSegment, Waveform};

use serde::{Deserialize, Serialize};

/// A half-open span `[start_ms, end_ms)` of detected silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceInterval {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SilenceInterval {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Get the duration of this interval.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}
