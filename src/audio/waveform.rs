use std::borrow::Cow;

use crate::error::{DubError, Result};

/// First frame of millisecond `ms` at `sample_rate`.
///
/// Every ms/frame conversion in the crate goes through this function so that
/// adjacent millisecond ranges tile a waveform without gaps or overlap.
pub fn frames_for_ms(ms: u64, sample_rate: u32) -> usize {
    (ms as u128 * sample_rate as u128 / 1000) as usize
}

/// Fewest frames that span at least `ms` whole milliseconds at `sample_rate`.
pub fn frames_covering_ms(ms: u64, sample_rate: u32) -> usize {
    (ms as u128 * sample_rate as u128).div_ceil(1000) as usize
}

/// Whole milliseconds covered by `frames` at `sample_rate`.
pub fn ms_for_frames(frames: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (frames as u128 * 1000 / sample_rate as u128) as u64
}

/// Decoded audio: interleaved signed 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waveform {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl Waveform {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(DubError::Decode(format!(
                "invalid stream layout: {sample_rate} Hz, {channels} channels"
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(DubError::Decode(format!(
                "{} samples do not divide into {channels} channels",
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Zero-amplitude audio of the given length.
    pub fn silent(duration_ms: u64, sample_rate: u32, channels: u16) -> Result<Self> {
        let frames = frames_for_ms(duration_ms, sample_rate);
        Self::new(vec![0; frames * channels as usize], sample_rate, channels)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> u64 {
        ms_for_frames(self.frames(), self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Borrow the span `[start_ms, end_ms)`, clamped to the waveform.
    pub fn segment(&self, start_ms: u64, end_ms: u64) -> AudioSegment<'_> {
        let start = frames_for_ms(start_ms, self.sample_rate).min(self.frames());
        let end = frames_for_ms(end_ms, self.sample_rate).clamp(start, self.frames());
        self.frame_segment(start, end)
    }

    /// Borrow everything from `start_ms` to the last frame, including any
    /// samples past the final whole millisecond.
    pub fn tail(&self, start_ms: u64) -> AudioSegment<'_> {
        let start = frames_for_ms(start_ms, self.sample_rate).min(self.frames());
        self.frame_segment(start, self.frames())
    }

    pub fn as_segment(&self) -> AudioSegment<'_> {
        self.frame_segment(0, self.frames())
    }

    fn frame_segment(&self, start: usize, end: usize) -> AudioSegment<'_> {
        let ch = self.channels as usize;
        AudioSegment {
            samples: Cow::Borrowed(&self.samples[start * ch..end * ch]),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Join segments into a new waveform.
    ///
    /// All pieces must share one sample rate and channel count.
    pub fn concat(segments: &[AudioSegment<'_>]) -> Result<Self> {
        let first = segments
            .first()
            .ok_or_else(|| DubError::Encoding("nothing to concatenate".to_string()))?;

        let total: usize = segments.iter().map(|s| s.samples.len()).sum();
        let mut samples = Vec::with_capacity(total);

        for (index, segment) in segments.iter().enumerate() {
            if segment.sample_rate != first.sample_rate || segment.channels != first.channels {
                return Err(DubError::Encoding(format!(
                    "segment {index} is {} Hz/{} ch, expected {} Hz/{} ch",
                    segment.sample_rate, segment.channels, first.sample_rate, first.channels
                )));
            }
            samples.extend_from_slice(&segment.samples);
        }

        Ok(Self {
            samples,
            sample_rate: first.sample_rate,
            channels: first.channels,
        })
    }
}

/// An immutable span of audio, either borrowed from a [`Waveform`] or
/// generated.
#[derive(Debug, Clone)]
pub struct AudioSegment<'a> {
    samples: Cow<'a, [i16]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioSegment<'static> {
    /// Zero-amplitude segment of exactly `frames` frames.
    pub fn silence_frames(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Cow::Owned(vec![0; frames * channels as usize]),
            sample_rate,
            channels,
        }
    }
}

impl AudioSegment<'_> {
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
