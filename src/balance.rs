//! Decide how much silence to add, and where, so speech fills the video.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::SilenceInterval;

/// Extra silence to append after one detected pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddingEntry {
    /// Index into the silence intervals the plan was built from.
    pub interval_index: usize,
    pub extra_silence_ms: u64,
}

/// Why a plan looks the way it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutcome {
    /// The deficit was spread over the detected pauses.
    Padded,
    /// Audio already lasts at least as long as the video. It is left as is;
    /// overrunning audio is never trimmed.
    AudioNotShorter,
    /// Audio is short but has no pauses to stretch, so it stays short.
    NoInsertionPoints,
}

/// Per-interval padding that brings the audio up to the video's length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddingPlan {
    pub entries: Vec<PaddingEntry>,
    pub outcome: PlanOutcome,
    pub audio_duration_ms: u64,
    pub video_duration_ms: u64,
}

impl PaddingPlan {
    /// Total silence the plan inserts.
    pub fn total_ms(&self) -> u64 {
        self.entries.iter().map(|e| e.extra_silence_ms).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Audio length after the plan is applied.
    pub fn planned_duration_ms(&self) -> u64 {
        self.audio_duration_ms + self.total_ms()
    }

    /// Signed `video - audio`, before padding.
    pub fn deficit_ms(&self) -> i64 {
        self.video_duration_ms as i64 - self.audio_duration_ms as i64
    }

    /// A plan with zero extra silence after every interval.
    pub fn zero(intervals: &[SilenceInterval], duration_ms: u64) -> Self {
        Self {
            entries: (0..intervals.len())
                .map(|interval_index| PaddingEntry {
                    interval_index,
                    extra_silence_ms: 0,
                })
                .collect(),
            outcome: PlanOutcome::Padded,
            audio_duration_ms: duration_ms,
            video_duration_ms: duration_ms,
        }
    }
}

/// Spread the gap between audio and video length over the detected pauses.
///
/// Each of the `N` intervals gets `deficit / N` ms; the integer remainder
/// goes to the last interval so the total is exact. No plan is produced when
/// the audio is already long enough or when there is nowhere to insert.
pub fn plan(
    audio_duration_ms: u64,
    video_duration_ms: u64,
    silence_intervals: &[SilenceInterval],
) -> PaddingPlan {
    let empty = |outcome| PaddingPlan {
        entries: vec![],
        outcome,
        audio_duration_ms,
        video_duration_ms,
    };

    if video_duration_ms <= audio_duration_ms {
        if audio_duration_ms > video_duration_ms {
            warn!(
                "Audio ({} ms) overruns video ({} ms) by {} ms; leaving it untrimmed",
                audio_duration_ms,
                video_duration_ms,
                audio_duration_ms - video_duration_ms
            );
        } else {
            info!("Audio already matches video length ({} ms)", audio_duration_ms);
        }
        return empty(PlanOutcome::AudioNotShorter);
    }

    let deficit = video_duration_ms - audio_duration_ms;

    if silence_intervals.is_empty() {
        warn!(
            "No pauses detected; audio will end {} ms before the video",
            deficit
        );
        return empty(PlanOutcome::NoInsertionPoints);
    }

    let n = silence_intervals.len() as u64;
    let share = deficit / n;
    let remainder = deficit % n;

    let entries = (0..silence_intervals.len())
        .map(|interval_index| {
            let last = interval_index + 1 == silence_intervals.len();
            PaddingEntry {
                interval_index,
                extra_silence_ms: if last { share + remainder } else { share },
            }
        })
        .collect();

    info!(
        "Padding {} pauses with {} ms each (+{} ms on the last) to close a {} ms gap",
        n, share, remainder, deficit
    );

    PaddingPlan {
        entries,
        outcome: PlanOutcome::Padded,
        audio_duration_ms,
        video_duration_ms,
    }
}
