use anyhow::{Context, Result};
use clap::Parser;
use dubsync::config::{AudioFormat, Config, VideoCodec};
use dubsync::job::{derive_extended_audio_path, derive_output_path, JobLayout};
use dubsync::pipeline::{print_summary, reconcile_with_cancel, PipelineConfig, PipelineResult};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "dubsync")]
#[command(version, about = "Fit a synthesized voice track to a video and swap it in")]
#[command(
    long_about = "Stretch the pauses of a speech track until it is as long as the video, \
                  then replace the video's audio with it."
)]
struct Cli {
    /// Original video file
    #[arg(required_unless_present = "job_dir")]
    video: Option<PathBuf>,

    /// Synthesized speech audio file
    #[arg(required_unless_present = "job_dir")]
    audio: Option<PathBuf>,

    /// Job directory holding uploaded_video.mp4 and output.mp3
    #[arg(short, long, conflicts_with_all = ["video", "audio"])]
    job_dir: Option<PathBuf>,

    /// Output video file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Shortest pause (ms) that can be stretched
    #[arg(long)]
    min_silence_ms: Option<u64>,

    /// Loudness floor (dBFS) at or below which audio is silent
    #[arg(long, allow_hyphen_values = true)]
    silence_threshold_db: Option<f64>,

    /// Video codec: copy, h264
    #[arg(long)]
    video_codec: Option<String>,

    /// AAC bitrate for the new audio stream
    #[arg(long)]
    audio_bitrate: Option<String>,

    /// Also write the extended speech track
    #[arg(long)]
    keep_extended_audio: bool,

    /// Format of the kept speech track: mp3, wav
    #[arg(long)]
    extended_audio_format: Option<String>,

    /// Only print the padding plan as JSON; write nothing
    #[arg(long)]
    plan_only: bool,

    /// Hide progress spinners
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Logs go to stderr so stdout carries only the run's result.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Write `result` as a single pretty-printed JSON document.
fn write_plan<W: Write>(result: &PipelineResult, mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, result)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Fold command-line flags over the loaded configuration.
fn apply_cli(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(ms) = cli.min_silence_ms {
        config.min_silence_duration_ms = ms;
    }
    if let Some(db) = cli.silence_threshold_db {
        config.silence_threshold_db = db;
    }
    if let Some(ref codec) = cli.video_codec {
        config.video_codec = codec
            .parse::<VideoCodec>()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if let Some(ref bitrate) = cli.audio_bitrate {
        config.audio_bitrate = bitrate.clone();
    }
    if let Some(ref format) = cli.extended_audio_format {
        config.extended_audio_format = format
            .parse::<AudioFormat>()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if let Some(ref output) = cli.output {
        config.output_path = Some(output.clone());
    }
    Ok(())
}

struct Paths {
    video: PathBuf,
    audio: PathBuf,
    output: PathBuf,
    extended_audio: Option<PathBuf>,
}

fn resolve_paths(cli: &Cli, config: &Config) -> Result<Paths> {
    let format = config.extended_audio_format;

    if let Some(ref dir) = cli.job_dir {
        let job = JobLayout::new(dir);
        job.validate_inputs()
            .with_context(|| format!("Job directory {} is incomplete", dir.display()))?;
        return Ok(Paths {
            video: job.video(),
            audio: job.speech(),
            output: config.output_path.clone().unwrap_or_else(|| job.final_video()),
            extended_audio: cli.keep_extended_audio.then(|| job.extended_audio(format)),
        });
    }

    let (Some(video), Some(audio)) = (cli.video.clone(), cli.audio.clone()) else {
        anyhow::bail!("Provide VIDEO and AUDIO, or --job-dir");
    };

    if !video.exists() {
        anyhow::bail!("Video file not found: {}", video.display());
    }
    if !audio.exists() {
        anyhow::bail!("Audio file not found: {}", audio.display());
    }

    let output = config
        .output_path
        .clone()
        .unwrap_or_else(|| derive_output_path(&video));
    let extended_audio = cli
        .keep_extended_audio
        .then(|| derive_extended_audio_path(&output, format));

    Ok(Paths {
        video,
        audio,
        output,
        extended_audio,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Load and validate configuration
    let mut config = Config::load().context("Failed to load configuration")?;
    apply_cli(&mut config, &cli)?;
    config.validate().context("Configuration validation failed")?;

    let paths = resolve_paths(&cli, &config)?;

    info!("Video:    {}", paths.video.display());
    info!("Audio:    {}", paths.audio.display());
    info!("Output:   {}", paths.output.display());
    info!(
        "Silence:  >= {} ms at <= {} dBFS",
        config.min_silence_duration_ms, config.silence_threshold_db
    );

    let pipeline_config = PipelineConfig {
        silence: config.silence_config(),
        remux: config.remux_options(),
        keep_extended_audio: paths.extended_audio.clone(),
        plan_only: cli.plan_only,
        show_progress: !cli.no_progress && !cli.plan_only,
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current stage");
        flag.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl+C handler")?;

    let plan_only = cli.plan_only;
    let result = tokio::task::spawn_blocking(move || {
        reconcile_with_cancel(
            &paths.video,
            &paths.audio,
            &paths.output,
            &pipeline_config,
            cancelled,
        )
    })
    .await
    .context("Pipeline worker panicked")?
    .map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("Dub sync failed during {stage}"))
    })?;

    if plan_only {
        write_plan(&result, std::io::stdout().lock())?;
    } else {
        print_summary(&result);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_inputs_or_job_dir() {
        assert!(Cli::try_parse_from(["dubsync"]).is_err());
        assert!(Cli::try_parse_from(["dubsync", "v.mp4", "a.mp3"]).is_ok());
        assert!(Cli::try_parse_from(["dubsync", "--job-dir", "job"]).is_ok());
        assert!(Cli::try_parse_from(["dubsync", "v.mp4", "a.mp3", "--job-dir", "job"]).is_err());
    }

    #[test]
    fn test_apply_cli_overrides() {
        let cli = Cli::try_parse_from([
            "dubsync",
            "v.mp4",
            "a.mp3",
            "--min-silence-ms",
            "300",
            "--silence-threshold-db",
            "-42",
            "--video-codec",
            "h264",
            "-o",
            "out.mp4",
        ])
        .unwrap();
        let mut config = Config::default();
        apply_cli(&mut config, &cli).unwrap();

        assert_eq!(config.min_silence_duration_ms, 300);
        assert_eq!(config.silence_threshold_db, -42.0);
        assert_eq!(config.video_codec, VideoCodec::H264);
        assert_eq!(config.output_path, Some(PathBuf::from("out.mp4")));
    }

    #[test]
    fn test_plan_output_is_one_json_document() {
        use dubsync::audio::SilenceInterval;
        use dubsync::balance::plan;
        use dubsync::pipeline::PipelineStats;

        let intervals = vec![SilenceInterval::new(3000, 3500), SilenceInterval::new(6500, 7000)];
        let result = PipelineResult {
            output_path: None,
            extended_audio_path: None,
            plan: plan(10_000, 13_000, &intervals),
            intervals,
            stats: PipelineStats::default(),
        };

        let mut out = Vec::new();
        write_plan(&result, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with('{'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["plan"]["outcome"], "padded");
        assert_eq!(value["plan"]["entries"][1]["extra_silence_ms"], 1500);
        assert_eq!(value["intervals"].as_array().unwrap().len(), 2);
        assert!(value["output_path"].is_null());
    }

    #[test]
    fn test_apply_cli_rejects_bad_codec() {
        let cli =
            Cli::try_parse_from(["dubsync", "v.mp4", "a.mp3", "--video-codec", "vp9"]).unwrap();
        let mut config = Config::default();
        assert!(apply_cli(&mut config, &cli).is_err());
    }

    #[test]
    fn test_resolve_job_dir_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let job = JobLayout::new(dir.path());
        std::fs::write(job.video(), b"v").unwrap();
        std::fs::write(job.speech(), b"a").unwrap();

        let args: Vec<std::ffi::OsString> = vec![
            "dubsync".into(),
            "--job-dir".into(),
            dir.path().into(),
            "--keep-extended-audio".into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let paths = resolve_paths(&cli, &Config::default()).unwrap();

        assert_eq!(paths.video, job.video());
        assert_eq!(paths.output, job.final_video());
        assert_eq!(paths.extended_audio, Some(job.extended_audio(AudioFormat::Mp3)));
    }
}
