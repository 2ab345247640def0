use crate::audio::SilenceConfig;
use crate::error::{DubError, Result};
use crate::remux::RemuxOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// Pass the original video stream through untouched.
    #[default]
    Copy,
    /// Re-encode the video stream with libx264.
    H264,
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::Copy => write!(f, "copy"),
            VideoCodec::H264 => write!(f, "h264"),
        }
    }
}

impl std::str::FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(VideoCodec::Copy),
            "h264" | "libx264" => Ok(VideoCodec::H264),
            _ => Err(format!("Unknown video codec: {}. Use 'copy' or 'h264'", s)),
        }
    }
}

impl VideoCodec {
    /// Value passed to ffmpeg's `-c:v`.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            VideoCodec::Copy => "copy",
            VideoCodec::H264 => "libx264",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioFormat::Mp3 => write!(f, "mp3"),
            AudioFormat::Wav => write!(f, "wav"),
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            _ => Err(format!("Unknown audio format: {}. Use 'mp3' or 'wav'", s)),
        }
    }
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shortest pause, in milliseconds, that counts as an insertion point.
    pub min_silence_duration_ms: u64,
    /// Loudness floor in dBFS at or below which audio counts as silent.
    pub silence_threshold_db: f64,
    /// Destination of the final video. Derived from the inputs when unset.
    pub output_path: Option<PathBuf>,
    pub video_codec: VideoCodec,
    pub audio_bitrate: String,
    pub extended_audio_format: AudioFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_silence_duration_ms: 500,
            silence_threshold_db: -50.0,
            output_path: None,
            video_codec: VideoCodec::default(),
            audio_bitrate: "192k".to_string(),
            extended_audio_format: AudioFormat::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    DubError::Config(format!("{}: {e}", config_path.display()))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override fields from `DUBSYNC_*` environment variables.
    fn apply_env(&mut self) {
        if let Ok(ms) = std::env::var("DUBSYNC_MIN_SILENCE_MS") {
            if let Ok(ms) = ms.parse() {
                self.min_silence_duration_ms = ms;
            }
        }
        if let Ok(db) = std::env::var("DUBSYNC_SILENCE_THRESHOLD_DB") {
            if let Ok(db) = db.parse() {
                self.silence_threshold_db = db;
            }
        }
        if let Ok(path) = std::env::var("DUBSYNC_OUTPUT") {
            self.output_path = Some(PathBuf::from(path));
        }
        if let Ok(codec) = std::env::var("DUBSYNC_VIDEO_CODEC") {
            if let Ok(c) = codec.parse() {
                self.video_codec = c;
            }
        }
        if let Ok(bitrate) = std::env::var("DUBSYNC_AUDIO_BITRATE") {
            self.audio_bitrate = bitrate;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_silence_duration_ms == 0 {
            return Err(DubError::Config(
                "min_silence_duration_ms must be greater than 0".to_string(),
            ));
        }

        if !self.silence_threshold_db.is_finite() || self.silence_threshold_db > 0.0 {
            return Err(DubError::Config(format!(
                "silence_threshold_db must be a finite dBFS value <= 0, got {}",
                self.silence_threshold_db
            )));
        }

        if self.audio_bitrate.trim().is_empty() {
            return Err(DubError::Config("audio_bitrate must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn silence_config(&self) -> SilenceConfig {
        SilenceConfig {
            min_silence_duration_ms: self.min_silence_duration_ms,
            silence_threshold_db: self.silence_threshold_db,
        }
    }

    pub fn remux_options(&self) -> RemuxOptions {
        RemuxOptions {
            video_codec: self.video_codec,
            audio_bitrate: self.audio_bitrate.clone(),
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dubsync").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_codec_parsing() {
        assert_eq!("copy".parse::<VideoCodec>().unwrap(), VideoCodec::Copy);
        assert_eq!("H264".parse::<VideoCodec>().unwrap(), VideoCodec::H264);
        assert_eq!("libx264".parse::<VideoCodec>().unwrap(), VideoCodec::H264);
        assert!("vp9".parse::<VideoCodec>().is_err());
    }

    #[test]
    fn test_audio_format_parsing() {
        assert_eq!("mp3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!("WAV".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert!("ogg".parse::<AudioFormat>().is_err());
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.min_silence_duration_ms, 500);
        assert_eq!(config.silence_threshold_db, -50.0);
        assert_eq!(config.video_codec, VideoCodec::Copy);
        assert!(config.output_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_min_silence() {
        let config = Config {
            min_silence_duration_ms: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DubError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_positive_threshold() {
        let mut config = Config::default();
        config.silence_threshold_db = 3.0;
        assert!(config.validate().is_err());

        config.silence_threshold_db = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let raw = "silence_threshold_db = -40.0\nvideo_codec = \"h264\"\n";
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.silence_threshold_db, -40.0);
        assert_eq!(config.video_codec, VideoCodec::H264);
        assert_eq!(config.min_silence_duration_ms, 500);
        assert_eq!(config.audio_bitrate, "192k");
    }

    #[test]
    fn test_silence_config_mirrors_fields() {
        let config = Config {
            min_silence_duration_ms: 300,
            silence_threshold_db: -45.0,
            ..Config::default()
        };
        let silence = config.silence_config();
        assert_eq!(silence.min_silence_duration_ms, 300);
        assert_eq!(silence.silence_threshold_db, -45.0);
    }
}
