use crate::audio::{
    detect, total_silence_ms, FfmpegCodec, SilenceConfig, SilenceInterval, WavCodec, Waveform,
    WaveformCodec,
};
use crate::balance::{plan, PaddingPlan, PlanOutcome};
use crate::error::{DubError, Result};
use crate::remux::{ContainerCodec, FfmpegContainer, RemuxOptions, Remuxer};
use crate::timeline::build;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::Builder;
use tracing::{debug, info, warn};

/// Configuration for one reconcile-and-remux run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Silence detection parameters.
    pub silence: SilenceConfig,
    /// Final container encoding.
    pub remux: RemuxOptions,
    /// Also write the extended speech track here.
    pub keep_extended_audio: Option<PathBuf>,
    /// Stop after planning; nothing is written.
    pub plan_only: bool,
    /// Show progress spinners.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            silence: SilenceConfig::default(),
            remux: RemuxOptions::default(),
            keep_extended_audio: None,
            plan_only: false,
            show_progress: true,
        }
    }
}

/// Statistics from one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Total time taken for the entire pipeline.
    pub total_time: Duration,
    /// Time taken probing the video and decoding speech.
    pub decode_time: Duration,
    /// Time taken detecting silence and planning.
    pub analysis_time: Duration,
    /// Time taken splicing the new track.
    pub build_time: Duration,
    /// Time taken writing the final video.
    pub remux_time: Duration,
    pub video_duration_ms: u64,
    pub audio_duration_ms: u64,
    pub output_audio_duration_ms: u64,
    pub silence_intervals: usize,
    pub inserted_silence_ms: u64,
}

/// Result of a run.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    /// Final video, unless the run was plan-only.
    pub output_path: Option<PathBuf>,
    /// Extended speech track, if it was kept.
    pub extended_audio_path: Option<PathBuf>,
    pub intervals: Vec<SilenceInterval>,
    pub plan: PaddingPlan,
    pub stats: PipelineStats,
}

fn spinner(show: bool, message: &'static str) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn finish(pb: Option<ProgressBar>, message: String) {
    if let Some(pb) = pb {
        pb.finish_with_message(message);
    }
}

fn check_cancelled(cancelled: &AtomicBool) -> Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        warn!("Run cancelled, no output written");
        return Err(DubError::Cancelled);
    }
    Ok(())
}

/// Fit `speech` to the length of `video` and write the result to `output`.
///
/// This is the main entry point. It:
/// 1. Probes the video duration and decodes the speech track
/// 2. Detects pauses in the speech
/// 3. Plans how much silence each pause receives
/// 4. Splices the extended track
/// 5. Replaces the video's audio with it
pub fn reconcile(
    video: &Path,
    speech: &Path,
    output: &Path,
    pipeline_config: &PipelineConfig,
) -> Result<PipelineResult> {
    let cancelled = Arc::new(AtomicBool::new(false));
    reconcile_with_cancel(video, speech, output, pipeline_config, cancelled)
}

/// [`reconcile`] with cancellation support.
pub fn reconcile_with_cancel(
    video: &Path,
    speech: &Path,
    output: &Path,
    pipeline_config: &PipelineConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineResult> {
    let codec = FfmpegCodec::new(pipeline_config.remux.audio_bitrate.clone());
    reconcile_with(
        video,
        speech,
        output,
        pipeline_config,
        &codec,
        &FfmpegContainer,
        &cancelled,
    )
}

/// Run the pipeline against explicit codecs.
///
/// `codec` decodes the speech and writes the optional extended track;
/// `container` probes the video and performs the remux.
pub fn reconcile_with<W: WaveformCodec, C: ContainerCodec>(
    video: &Path,
    speech: &Path,
    output: &Path,
    pipeline_config: &PipelineConfig,
    codec: &W,
    container: &C,
    cancelled: &AtomicBool,
) -> Result<PipelineResult> {
    let start_time = Instant::now();
    let show = pipeline_config.show_progress;

    for input in [video, speech] {
        if !input.exists() {
            return Err(DubError::FileNotFound(input.display().to_string()));
        }
    }

    // Stage 1: probe + decode
    info!("Stage 1/4: Reading {} and {}", video.display(), speech.display());
    let decode_start = Instant::now();
    let pb = spinner(show, "Decoding speech...");

    let video_duration_ms = container.duration_ms(video)?;
    let waveform = codec.decode(speech)?;
    let audio_duration_ms = waveform.duration_ms();

    finish(
        pb,
        format!(
            "✓ Speech {:.1}s, video {:.1}s",
            audio_duration_ms as f64 / 1000.0,
            video_duration_ms as f64 / 1000.0
        ),
    );
    let decode_time = decode_start.elapsed();
    info!(
        "Video {} ms, speech {} ms ({} Hz, {} ch)",
        video_duration_ms,
        audio_duration_ms,
        waveform.sample_rate(),
        waveform.channels()
    );

    check_cancelled(cancelled)?;

    // Stage 2: detect + plan
    info!("Stage 2/4: Finding pauses");
    let analysis_start = Instant::now();
    let pb = spinner(show, "Detecting silence...");

    let intervals = detect(&waveform, &pipeline_config.silence);
    debug!("Existing pauses total {} ms", total_silence_ms(&intervals));
    let padding = plan(audio_duration_ms, video_duration_ms, &intervals);

    finish(
        pb,
        format!(
            "✓ {} pauses, {} ms to insert",
            intervals.len(),
            padding.total_ms()
        ),
    );
    let analysis_time = analysis_start.elapsed();

    let mut stats = PipelineStats {
        decode_time,
        analysis_time,
        video_duration_ms,
        audio_duration_ms,
        output_audio_duration_ms: padding.planned_duration_ms(),
        silence_intervals: intervals.len(),
        inserted_silence_ms: padding.total_ms(),
        ..PipelineStats::default()
    };

    if pipeline_config.plan_only {
        info!("Plan only; skipping build and remux");
        stats.total_time = start_time.elapsed();
        return Ok(PipelineResult {
            output_path: None,
            extended_audio_path: None,
            intervals,
            plan: padding,
            stats,
        });
    }

    check_cancelled(cancelled)?;

    // Stage 3: splice
    info!("Stage 3/4: Building extended audio");
    let build_start = Instant::now();
    let pb = spinner(show, "Splicing audio...");

    let extended = build(&waveform, &intervals, &padding)?;
    drop(waveform);
    stats.output_audio_duration_ms = extended.duration_ms();

    finish(
        pb,
        format!("✓ Audio now {:.1}s", extended.duration_ms() as f64 / 1000.0),
    );
    stats.build_time = build_start.elapsed();

    check_cancelled(cancelled)?;

    // Stage 4: remux
    info!("Stage 4/4: Replacing audio in {}", video.display());
    let remux_start = Instant::now();
    let pb = spinner(show, "Remuxing video...");

    let remuxer = Remuxer::with_parts(container, WavCodec, pipeline_config.remux.clone());
    remuxer.remux(video, &extended, output)?;

    // Only a run that produced the final video leaves the extended track behind.
    let extended_audio_path = match &pipeline_config.keep_extended_audio {
        Some(path) => {
            write_extended_track(codec, &extended, path)?;
            Some(path.clone())
        }
        None => None,
    };

    finish(pb, format!("✓ Wrote {}", output.display()));
    stats.remux_time = remux_start.elapsed();
    stats.total_time = start_time.elapsed();

    debug!("Run stats: {:?}", stats);

    Ok(PipelineResult {
        output_path: Some(output.to_path_buf()),
        extended_audio_path,
        intervals,
        plan: padding,
        stats,
    })
}

/// Encode `extended` next to `path` and move it into place once complete.
fn write_extended_track<W: WaveformCodec>(
    codec: &W,
    extended: &Waveform,
    path: &Path,
) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    // Encoders are chosen by extension, so the partial file keeps it.
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("wav");
    let partial = Builder::new()
        .prefix(".dubsync-")
        .suffix(&format!(".partial.{ext}"))
        .tempfile_in(&dir)?;

    codec.encode(extended, partial.path())?;

    partial.persist(path).map_err(|e| {
        DubError::Encoding(format!("Cannot move extended audio into {}: {e}", path.display()))
    })?;

    info!("Extended audio written to {}", path.display());
    Ok(())
}

/// Print a summary of the pipeline results.
pub fn print_summary(result: &PipelineResult) {
    let stats = &result.stats;
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                        Dub Sync Complete                        ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    match &result.output_path {
        Some(path) => println!("  Output:     {}", path.display()),
        None => println!("  Output:     (plan only)"),
    }
    if let Some(path) = &result.extended_audio_path {
        println!("  Audio:      {}", path.display());
    }
    println!("  Video:      {:.2}s", stats.video_duration_ms as f64 / 1000.0);
    println!(
        "  Speech:     {:.2}s -> {:.2}s",
        stats.audio_duration_ms as f64 / 1000.0,
        stats.output_audio_duration_ms as f64 / 1000.0
    );
    println!(
        "  Pauses:     {} (+{} ms)",
        stats.silence_intervals, stats.inserted_silence_ms
    );
    println!();
    println!("  Timing:");
    println!("    Decode:      {:.2}s", stats.decode_time.as_secs_f64());
    println!("    Analyze:     {:.2}s", stats.analysis_time.as_secs_f64());
    println!("    Build:       {:.2}s", stats.build_time.as_secs_f64());
    println!("    Remux:       {:.2}s", stats.remux_time.as_secs_f64());
    println!("    Total:       {:.2}s", stats.total_time.as_secs_f64());
    match result.plan.outcome {
        PlanOutcome::Padded => {}
        PlanOutcome::AudioNotShorter => {
            println!();
            println!("  Note: speech is not shorter than the video; it was left untrimmed");
        }
        PlanOutcome::NoInsertionPoints => {
            println!();
            println!("  Note: no pauses found; audio ends before the video does");
        }
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
