use std::path::{Path, PathBuf};

use crate::config::AudioFormat;
use crate::error::{DubError, Result};

pub const VIDEO_FILE: &str = "uploaded_video.mp4";
pub const SPEECH_FILE: &str = "output.mp3";
pub const EXTENDED_AUDIO_STEM: &str = "extended_audio_with_silence";
pub const FINAL_VIDEO_FILE: &str = "final_video.mp4";

/// Fixed file names inside one job directory.
///
/// Upstream steps drop the uploaded video and the synthesized speech here;
/// this crate writes the extended track and the final video next to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    dir: PathBuf,
}

impl JobLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn video(&self) -> PathBuf {
        self.dir.join(VIDEO_FILE)
    }

    pub fn speech(&self) -> PathBuf {
        self.dir.join(SPEECH_FILE)
    }

    pub fn extended_audio(&self, format: AudioFormat) -> PathBuf {
        self.dir
            .join(format!("{}.{}", EXTENDED_AUDIO_STEM, format.extension()))
    }

    pub fn final_video(&self) -> PathBuf {
        self.dir.join(FINAL_VIDEO_FILE)
    }

    /// Both inputs must exist before a run starts.
    pub fn validate_inputs(&self) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(DubError::FileNotFound(self.dir.display().to_string()));
        }
        for path in [self.video(), self.speech()] {
            if !path.exists() {
                return Err(DubError::FileNotFound(path.display().to_string()));
            }
        }
        Ok(())
    }
}

/// Default output for a standalone video: `<stem>_dubbed.<ext>` beside it.
pub fn derive_output_path(video: &Path) -> PathBuf {
    let stem = video.file_stem().unwrap_or_default().to_string_lossy();
    let ext = video
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    video.with_file_name(format!("{stem}_dubbed.{ext}"))
}

/// Where to keep the extended track when no job directory is in use.
pub fn derive_extended_audio_path(output: &Path, format: AudioFormat) -> PathBuf {
    let stem = output.file_stem().unwrap_or_default().to_string_lossy();
    output.with_file_name(format!("{stem}_audio.{}", format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let job = JobLayout::new("/jobs/abc");
        assert_eq!(job.video(), PathBuf::from("/jobs/abc/uploaded_video.mp4"));
        assert_eq!(job.speech(), PathBuf::from("/jobs/abc/output.mp3"));
        assert_eq!(
            job.extended_audio(AudioFormat::Mp3),
            PathBuf::from("/jobs/abc/extended_audio_with_silence.mp3")
        );
        assert_eq!(job.final_video(), PathBuf::from("/jobs/abc/final_video.mp4"));
    }

    #[test]
    fn test_validate_inputs() {
        let dir = TempDir::new().unwrap();
        let job = JobLayout::new(dir.path());

        match job.validate_inputs() {
            Err(DubError::FileNotFound(p)) => assert!(p.ends_with(VIDEO_FILE)),
            other => panic!("Expected FileNotFound, got {other:?}"),
        }

        std::fs::write(job.video(), b"v").unwrap();
        match job.validate_inputs() {
            Err(DubError::FileNotFound(p)) => assert!(p.ends_with(SPEECH_FILE)),
            other => panic!("Expected FileNotFound, got {other:?}"),
        }

        std::fs::write(job.speech(), b"a").unwrap();
        assert!(job.validate_inputs().is_ok());
    }

    #[test]
    fn test_validate_missing_dir() {
        let job = JobLayout::new("/nonexistent/job");
        assert!(matches!(job.validate_inputs(), Err(DubError::FileNotFound(_))));
    }

    #[test]
    fn test_derive_output_path() {
        assert_eq!(
            derive_output_path(Path::new("/v/clip.mov")),
            PathBuf::from("/v/clip_dubbed.mov")
        );
        assert_eq!(
            derive_output_path(Path::new("clip")),
            PathBuf::from("clip_dubbed.mp4")
        );
    }

    #[test]
    fn test_derive_extended_audio_path() {
        assert_eq!(
            derive_extended_audio_path(Path::new("/o/final.mp4"), AudioFormat::Wav),
            PathBuf::from("/o/final_audio.wav")
        );
    }
}
