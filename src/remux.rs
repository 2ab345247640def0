//! Replace a video's audio stream with a rebuilt track.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::{Builder, TempDir};
use tracing::{debug, info};

use crate::audio::{
    check_ffmpeg, get_media_duration, has_video_stream, WavCodec, Waveform, WaveformCodec,
};
use crate::config::VideoCodec;
use crate::error::{DubError, Result};

/// Encoding choices for the final container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemuxOptions {
    pub video_codec: VideoCodec,
    /// AAC bitrate, e.g. `192k`.
    pub audio_bitrate: String,
}

impl Default for RemuxOptions {
    fn default() -> Self {
        Self {
            video_codec: VideoCodec::Copy,
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// Container-level operations on the original video.
pub trait ContainerCodec {
    /// Length of the video in whole milliseconds.
    fn duration_ms(&self, video: &Path) -> Result<u64>;

    /// Write `output` with the first video stream of `video` and `audio` as
    /// its only audio stream.
    fn replace_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        options: &RemuxOptions,
    ) -> Result<()>;
}

impl<C: ContainerCodec + ?Sized> ContainerCodec for &C {
    fn duration_ms(&self, video: &Path) -> Result<u64> {
        (**self).duration_ms(video)
    }

    fn replace_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        options: &RemuxOptions,
    ) -> Result<()> {
        (**self).replace_audio(video, audio, output, options)
    }
}

/// [`ContainerCodec`] backed by the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegContainer;

/// ffmpeg arguments that mux `video`'s picture with `audio` into `output`.
///
/// The original audio is dropped by mapping only `0:v:0` and `1:a:0`. No
/// `-shortest`: a short track ends early and a long one outlasts the picture.
pub fn remux_args(
    video: &Path,
    audio: &Path,
    output: &Path,
    options: &RemuxOptions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-v".into(), "error".into()];
    args.push("-i".into());
    args.push(video.into());
    args.push("-i".into());
    args.push(audio.into());
    for arg in ["-map", "0:v:0", "-map", "1:a:0", "-c:v", options.video_codec.ffmpeg_name()] {
        args.push(arg.into());
    }
    if options.video_codec == VideoCodec::H264 {
        for arg in ["-preset", "medium", "-pix_fmt", "yuv420p"] {
            args.push(arg.into());
        }
    }
    for arg in [
        "-c:a",
        "aac",
        "-b:a",
        options.audio_bitrate.as_str(),
        "-avoid_negative_ts",
        "make_zero",
        "-movflags",
        "+faststart",
    ] {
        args.push(arg.into());
    }
    args.push(output.into());
    args
}

impl ContainerCodec for FfmpegContainer {
    fn duration_ms(&self, video: &Path) -> Result<u64> {
        let duration = get_media_duration(video)?;
        Ok(duration.as_millis() as u64)
    }

    fn replace_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        options: &RemuxOptions,
    ) -> Result<()> {
        for input in [video, audio] {
            if !input.exists() {
                return Err(DubError::FileNotFound(input.display().to_string()));
            }
        }
        check_ffmpeg()?;

        if !has_video_stream(video).map_err(|e| DubError::Mux(e.to_string()))? {
            return Err(DubError::Mux(format!("{} has no video stream", video.display())));
        }

        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| DubError::Mux(format!("Cannot create {}: {e}", dir.display())))?;

        // ffmpeg picks the muxer from the extension, so the partial file keeps it.
        let ext = output.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
        let partial = Builder::new()
            .prefix(".dubsync-")
            .suffix(&format!(".partial.{ext}"))
            .tempfile_in(&dir)
            .map_err(|e| {
                DubError::Mux(format!(
                    "Cannot create partial output in {}: {e}",
                    dir.display()
                ))
            })?;

        let args = remux_args(video, audio, partial.path(), options);
        debug!("ffmpeg {:?}", args);

        let result = Command::new("ffmpeg")
            .args(&args)
            .output()
            .map_err(|e| DubError::Mux(format!("Failed to run FFmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(DubError::Mux(format!("FFmpeg remux failed: {}", stderr.trim())));
        }

        let written = std::fs::metadata(partial.path()).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(DubError::Mux("FFmpeg produced an empty file".to_string()));
        }

        partial
            .persist(output)
            .map_err(|e| {
                DubError::Mux(format!("Cannot move output into {}: {e}", output.display()))
            })?;

        info!("Final video written to {}", output.display());
        Ok(())
    }
}

/// Attaches an in-memory [`Waveform`] to a video.
///
/// The waveform is encoded to a temporary file with `codec`, then handed to
/// `container`. The temporary file is removed on every exit path.
pub struct Remuxer<C = FfmpegContainer, W = WavCodec> {
    container: C,
    codec: W,
    options: RemuxOptions,
}

impl Remuxer {
    pub fn new(options: RemuxOptions) -> Self {
        Self::with_parts(FfmpegContainer, WavCodec, options)
    }
}

impl<C: ContainerCodec, W: WaveformCodec> Remuxer<C, W> {
    pub fn with_parts(container: C, codec: W, options: RemuxOptions) -> Self {
        Self {
            container,
            codec,
            options,
        }
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn remux(&self, video: &Path, new_audio: &Waveform, output: &Path) -> Result<()> {
        let scratch = TempDir::new()?;
        let audio_path = scratch.path().join("replacement.wav");

        self.codec.encode(new_audio, &audio_path)?;
        debug!(
            "Replacement audio staged at {} ({} ms)",
            audio_path.display(),
            new_audio.duration_ms()
        );

        self.container
            .replace_audio(video, &audio_path, output, &self.options)
    }
}
