use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::error::{DubError, Result};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            DubError::ToolMissing(format!(
                "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(DubError::ToolMissing("FFmpeg check failed".to_string()));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    let output = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            DubError::ToolMissing(format!(
                "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(DubError::ToolMissing("FFprobe check failed".to_string()));
    }

    debug!("FFprobe is available");
    Ok(())
}

/// Run ffprobe with `args` against `input` and return trimmed stdout.
fn ffprobe(args: &[&str], input: &Path) -> Result<String> {
    if !input.exists() {
        return Err(DubError::FileNotFound(input.display().to_string()));
    }

    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(args)
        .arg(input)
        .output()
        .map_err(|e| DubError::Decode(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DubError::Decode(format!(
            "FFprobe failed on {}: {}",
            input.display(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Get the container duration of a media file.
pub fn get_media_duration(input: &Path) -> Result<Duration> {
    let duration_str = ffprobe(
        &[
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
        input,
    )?;

    parse_duration(&duration_str)
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let duration_secs: f64 = raw
        .trim()
        .parse()
        .map_err(|e| DubError::Decode(format!("Failed to parse duration '{}': {e}", raw.trim())))?;

    if !duration_secs.is_finite() || duration_secs < 0.0 {
        return Err(DubError::Decode(format!("Invalid duration: {duration_secs}")));
    }

    Duration::try_from_secs_f64(duration_secs)
        .map_err(|e| DubError::Decode(format!("Duration out of range '{}': {e}", raw.trim())))
}

fn has_stream(input: &Path, selector: &str) -> Result<bool> {
    let out = ffprobe(
        &[
            "-select_streams",
            selector,
            "-show_entries",
            "stream=index",
            "-of",
            "csv=p=0",
        ],
        input,
    )?;
    Ok(!out.is_empty())
}

/// Whether the file carries at least one audio stream.
pub fn has_audio_stream(input: &Path) -> Result<bool> {
    has_stream(input, "a")
}

/// Whether the file carries at least one video stream.
pub fn has_video_stream(input: &Path) -> Result<bool> {
    has_stream(input, "v")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
            && Command::new("ffprobe")
                .arg("-version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
    }

    #[test]
    fn test_check_ffmpeg() {
        let result = check_ffmpeg().and_then(|_| check_ffprobe());
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available or broken");
            return;
        }
        assert!(result.is_ok(), "FFmpeg check failed: {:?}", result.err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("13.000000\n").unwrap(), Duration::from_secs(13));
        assert_eq!(parse_duration("0.5").unwrap(), Duration::from_millis(500));
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-1").is_err());
    }

    #[test]
    fn test_parse_duration_out_of_range() {
        assert!(matches!(parse_duration("1e30"), Err(DubError::Decode(_))));
        assert!(matches!(parse_duration("inf"), Err(DubError::Decode(_))));
    }

    #[test]
    fn test_probe_missing_file() {
        let result = get_media_duration(Path::new("/nonexistent/video.mp4"));
        match result {
            Err(DubError::FileNotFound(path)) => assert!(path.contains("nonexistent")),
            other => panic!("Expected FileNotFound, got {other:?}"),
        }
    }
}
