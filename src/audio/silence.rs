use tracing::{debug, info};

use super::waveform::{frames_for_ms, Waveform};
use super::SilenceInterval;

/// Full-scale amplitude of signed 16-bit PCM.
const FULL_SCALE: f64 = 32768.0;

/// Parameters for amplitude-based silence detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceConfig {
    /// Minimum length of a pause worth reporting.
    pub min_silence_duration_ms: u64,

    /// RMS level in dBFS at or below which a window counts as silent.
    pub silence_threshold_db: f64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            min_silence_duration_ms: 500,
            silence_threshold_db: -50.0,
        }
    }
}

/// Level in dBFS of an RMS amplitude. Zero is `-inf`.
fn rms_to_dbfs(rms: f64) -> f64 {
    if rms <= 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * (rms / FULL_SCALE).log10()
}

/// RMS amplitude of raw samples.
fn calculate_rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: u64 = samples.iter().map(|&s| (s as i64 * s as i64) as u64).sum();
    (sum_squares as f64 / samples.len() as f64).sqrt()
}

/// Find every pause of at least `min_silence_duration_ms` whose RMS level
/// stays at or below `silence_threshold_db`.
///
/// A window of `min_silence_duration_ms` is evaluated at every millisecond.
/// Overlapping or touching silent windows are merged into one interval, so the
/// result is sorted and non-overlapping. An empty result is a normal outcome.
pub fn detect(waveform: &Waveform, config: &SilenceConfig) -> Vec<SilenceInterval> {
    let window = config.min_silence_duration_ms.max(1);
    let duration_ms = waveform.duration_ms();

    if duration_ms < window {
        debug!(
            "Audio ({} ms) shorter than silence window ({} ms)",
            duration_ms, window
        );
        return vec![];
    }

    let prefix = energy_prefix(waveform, duration_ms);
    let ratio = 10f64.powf(config.silence_threshold_db / 20.0) * FULL_SCALE;
    let threshold_sq = ratio * ratio;

    let rate = waveform.sample_rate();
    let channels = waveform.channels() as usize;
    let is_silent = |start: u64| -> bool {
        let end = start + window;
        let energy = prefix[end as usize] - prefix[start as usize];
        let count = (frames_for_ms(end, rate) - frames_for_ms(start, rate)) * channels;
        if count == 0 {
            return true;
        }
        energy as f64 <= threshold_sq * count as f64
    };

    let mut intervals = Vec::new();
    let mut current: Option<(u64, u64)> = None;

    for start in 0..=(duration_ms - window) {
        if !is_silent(start) {
            continue;
        }
        current = match current {
            // A gap only exists when this window starts past the last one's end.
            Some((range_start, prev)) if start > prev + window => {
                intervals.push(SilenceInterval::new(range_start, prev + window));
                Some((start, start))
            }
            Some((range_start, _)) => Some((range_start, start)),
            None => Some((start, start)),
        };
    }

    if let Some((range_start, prev)) = current {
        intervals.push(SilenceInterval::new(range_start, prev + window));
    }

    if tracing::enabled!(tracing::Level::DEBUG) {
        for interval in &intervals {
            let segment = waveform.segment(interval.start_ms, interval.end_ms);
            debug!(
                "Pause [{}, {}) ms at {:.1} dBFS",
                interval.start_ms,
                interval.end_ms,
                rms_to_dbfs(calculate_rms(segment.samples()))
            );
        }
    }

    info!(
        "Detected {} silence intervals in {:.2}s of audio (window {} ms, floor {} dBFS)",
        intervals.len(),
        duration_ms as f64 / 1000.0,
        window,
        config.silence_threshold_db
    );

    intervals
}

/// Cumulative sum of squared samples at each millisecond boundary.
fn energy_prefix(waveform: &Waveform, duration_ms: u64) -> Vec<u64> {
    let rate = waveform.sample_rate();
    let channels = waveform.channels() as usize;
    let samples = waveform.samples();

    let mut prefix = Vec::with_capacity(duration_ms as usize + 1);
    prefix.push(0u64);
    let mut acc = 0u64;

    for ms in 0..duration_ms {
        let lo = frames_for_ms(ms, rate) * channels;
        let hi = frames_for_ms(ms + 1, rate) * channels;
        acc += samples[lo..hi]
            .iter()
            .map(|&s| (s as i64 * s as i64) as u64)
            .sum::<u64>();
        prefix.push(acc);
    }

    prefix
}

/// Total time covered by the intervals.
pub fn total_silence_ms(intervals: &[SilenceInterval]) -> u64 {
    intervals.iter().map(SilenceInterval::duration_ms).sum()
}
