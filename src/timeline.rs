//! Splice original speech, original pauses and inserted silence into a new
//! waveform.

use tracing::{debug, info};

use crate::audio::{frames_covering_ms, AudioSegment, SilenceInterval, Waveform};
use crate::balance::PaddingPlan;
use crate::error::{DubError, Result};

/// Apply `plan` to `waveform`.
///
/// For each interval in order this emits the speech leading up to it, the
/// original pause verbatim, then the planned amount of zero-amplitude
/// silence. Whatever follows the last interval is copied through unchanged.
/// An empty plan returns the input as is; an all-zero plan reproduces it
/// sample for sample.
pub fn build(
    waveform: &Waveform,
    silence_intervals: &[SilenceInterval],
    plan: &PaddingPlan,
) -> Result<Waveform> {
    if plan.is_empty() {
        debug!("Empty padding plan, audio unchanged");
        return Ok(waveform.clone());
    }

    check_plan(waveform, silence_intervals, plan)?;

    let rate = waveform.sample_rate();
    let channels = waveform.channels();
    let source_ms = waveform.duration_ms();
    let source_frames = waveform.frames();

    // Inserted frames so far, once `ms` of padding has been placed. Sized from
    // the source's real frame count so the result measures exactly
    // `source_ms + ms`, including sub-millisecond frames past the last whole ms.
    let inserted_frames = |ms: u64| -> usize {
        if ms == 0 {
            0
        } else {
            frames_covering_ms(source_ms + ms, rate).saturating_sub(source_frames)
        }
    };

    let mut segments: Vec<AudioSegment<'_>> = Vec::with_capacity(silence_intervals.len() * 3 + 1);
    let mut prev_end = 0u64;
    let mut inserted_ms = 0u64;

    for (interval, entry) in silence_intervals.iter().zip(&plan.entries) {
        segments.push(waveform.segment(prev_end, interval.start_ms));
        segments.push(waveform.segment(interval.start_ms, interval.end_ms));

        // Per-pause frame counts come from the running total so rounding
        // never accumulates across pauses.
        let before = inserted_frames(inserted_ms);
        inserted_ms += entry.extra_silence_ms;
        let frames = inserted_frames(inserted_ms) - before;
        if frames > 0 {
            segments.push(AudioSegment::silence_frames(frames, rate, channels));
        }

        prev_end = interval.end_ms;
    }

    segments.push(waveform.tail(prev_end));

    let extended = Waveform::concat(&segments)?;

    info!(
        "Inserted {} ms of silence across {} pauses: {} ms -> {} ms",
        inserted_ms,
        plan.entries.len(),
        waveform.duration_ms(),
        extended.duration_ms()
    );

    Ok(extended)
}

/// The plan must line up one-to-one with sorted, in-bounds intervals.
fn check_plan(
    waveform: &Waveform,
    silence_intervals: &[SilenceInterval],
    plan: &PaddingPlan,
) -> Result<()> {
    if plan.entries.len() != silence_intervals.len() {
        return Err(DubError::Encoding(format!(
            "padding plan has {} entries for {} silence intervals",
            plan.entries.len(),
            silence_intervals.len()
        )));
    }

    let duration_ms = waveform.duration_ms();
    let mut prev_end = 0u64;

    for (i, (interval, entry)) in silence_intervals.iter().zip(&plan.entries).enumerate() {
        if entry.interval_index != i {
            return Err(DubError::Encoding(format!(
                "plan entry {i} targets interval {}",
                entry.interval_index
            )));
        }
        if interval.start_ms >= interval.end_ms
            || interval.start_ms < prev_end
            || interval.end_ms > duration_ms
        {
            return Err(DubError::Encoding(format!(
                "silence interval {i} [{}, {}) is out of order or outside {} ms of audio",
                interval.start_ms, interval.end_ms, duration_ms
            )));
        }
        prev_end = interval.end_ms;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frames_for_ms;
    use crate::balance::{plan, PaddingEntry, PlanOutcome};

    const RATE: u32 = 8000;

    /// Speech is a constant non-zero marker per piece so order is checkable.
    fn speech_and_pauses(parts: &[(u64, i16)]) -> Waveform {
        let mut samples = Vec::new();
        for &(ms, value) in parts {
            samples.extend(std::iter::repeat(value).take(frames_for_ms(ms, RATE)));
        }
        Waveform::new(samples, RATE, 1).unwrap()
    }

    fn markers(wave: &Waveform) -> Vec<i16> {
        let mut out: Vec<i16> = Vec::new();
        for &s in wave.samples() {
            if s != 0 && out.last() != Some(&s) {
                out.push(s);
            }
        }
        out
    }

    #[test]
    fn test_inserts_after_each_pause() {
        let wave = speech_and_pauses(&[(1000, 1), (500, 0), (1000, 2), (500, 0), (1000, 3)]);
        let intervals = vec![SilenceInterval::new(1000, 1500), SilenceInterval::new(2500, 3000)];
        let plan = plan(4000, 5000, &intervals);

        let out = build(&wave, &intervals, &plan).unwrap();

        assert_eq!(out.duration_ms(), 5000);
        assert_eq!(markers(&out), vec![1, 2, 3]);
        // Pause one now spans 1000..2000 ms, speech 2 resumes right after.
        assert!(out.segment(1000, 2000).samples().iter().all(|&s| s == 0));
        assert!(out.segment(2000, 3000).samples().iter().all(|&s| s == 2));
        assert!(out.segment(3000, 4000).samples().iter().all(|&s| s == 0));
        assert!(out.segment(4000, 5000).samples().iter().all(|&s| s == 3));
    }

    #[test]
    fn test_zero_plan_reproduces_input() {
        let wave = speech_and_pauses(&[(700, 5), (600, 0), (900, -7)]);
        let intervals = vec![SilenceInterval::new(700, 1300)];
        let zero = PaddingPlan::zero(&intervals, wave.duration_ms());

        assert_eq!(build(&wave, &intervals, &zero).unwrap(), wave);
    }

    #[test]
    fn test_empty_plan_is_identity() {
        let wave = speech_and_pauses(&[(2000, 9)]);
        let plan = plan(2000, 1500, &[]);
        assert_eq!(plan.outcome, PlanOutcome::AudioNotShorter);
        assert_eq!(build(&wave, &[], &plan).unwrap(), wave);
    }

    #[test]
    fn test_interval_at_very_end() {
        let wave = speech_and_pauses(&[(1000, 4), (600, 0)]);
        let intervals = vec![SilenceInterval::new(1000, 1600)];
        let plan = plan(1600, 2600, &intervals);

        let out = build(&wave, &intervals, &plan).unwrap();
        assert_eq!(out.duration_ms(), 2600);
        assert!(out.tail(1000).samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_stray_frames_after_last_ms_are_kept() {
        let mut samples = vec![3i16; 8000];
        samples.extend(vec![0i16; 4000]);
        samples.extend(vec![6i16; 8003]);
        let wave = Waveform::new(samples, RATE, 1).unwrap();
        let intervals = vec![SilenceInterval::new(1000, 1500)];
        let plan = plan(wave.duration_ms(), 3000, &intervals);

        let out = build(&wave, &intervals, &plan).unwrap();
        assert_eq!(out.duration_ms(), 3000);
        assert_eq!(out.frames(), frames_covering_ms(3000, RATE));
        assert_eq!(&out.samples()[out.samples().len() - 3..], &[6, 6, 6]);
        assert_eq!(out.tail(1500).samples().iter().filter(|&&s| s == 6).count(), 8003);
    }

    #[test]
    fn test_odd_sample_rate_total_is_exact() {
        let rate = 44100;
        let frames = frames_for_ms(3000, rate);
        let wave = Waveform::new(vec![0i16; frames * 2], rate, 2).unwrap();
        let intervals = vec![
            SilenceInterval::new(0, 700),
            SilenceInterval::new(1000, 1700),
            SilenceInterval::new(2000, 2700),
        ];
        // 1001 / 3 leaves a remainder, and 333 ms is not a whole number of frames.
        let plan = plan(3000, 4001, &intervals);

        let out = build(&wave, &intervals, &plan).unwrap();
        assert_eq!(out.duration_ms(), 3000 + 1001);
        assert_eq!(out.frames(), frames_covering_ms(4001, rate));
    }

    #[test]
    fn test_cd_rate_duration_matches_plan() {
        let rate = 44100;
        let mut samples = vec![9i16; frames_for_ms(4000, rate)];
        samples.extend(vec![0i16; frames_for_ms(1000, rate)]);
        samples.extend(vec![7i16; frames_for_ms(5000, rate)]);
        let wave = Waveform::new(samples, rate, 1).unwrap();
        let intervals = vec![SilenceInterval::new(4000, 5000)];
        let plan = plan(wave.duration_ms(), 11_001, &intervals);
        assert_eq!(plan.total_ms(), 1001);

        let out = build(&wave, &intervals, &plan).unwrap();
        assert_eq!(out.duration_ms(), 11_001);
        assert_eq!(out.duration_ms(), plan.planned_duration_ms());
        assert_eq!(markers(&out), vec![9, 7]);
    }

    #[test]
    fn test_mismatched_plan_is_encoding_error() {
        let wave = speech_and_pauses(&[(3000, 1)]);
        let intervals = vec![SilenceInterval::new(0, 500), SilenceInterval::new(1000, 1500)];
        let plan = PaddingPlan {
            entries: vec![PaddingEntry { interval_index: 0, extra_silence_ms: 10 }],
            outcome: PlanOutcome::Padded,
            audio_duration_ms: 3000,
            video_duration_ms: 3010,
        };
        assert!(matches!(build(&wave, &intervals, &plan), Err(DubError::Encoding(_))));
    }

    #[test]
    fn test_out_of_bounds_interval_is_encoding_error() {
        let wave = speech_and_pauses(&[(1000, 1)]);
        let intervals = vec![SilenceInterval::new(800, 1200)];
        let plan = plan(1000, 2000, &intervals);
        assert!(matches!(build(&wave, &intervals, &plan), Err(DubError::Encoding(_))));
    }

    #[test]
    fn test_overlapping_intervals_rejected() {
        let wave = speech_and_pauses(&[(3000, 1)]);
        let intervals = vec![SilenceInterval::new(0, 1000), SilenceInterval::new(900, 1500)];
        let plan = plan(3000, 4000, &intervals);
        assert!(build(&wave, &intervals, &plan).is_err());
    }
}
