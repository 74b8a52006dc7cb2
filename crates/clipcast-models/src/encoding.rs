//! Output formats and encoding profiles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Thumbnail generation settings
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;
pub const THUMBNAIL_JPEG_QUALITY: u8 = 2;

/// Container format for extracted clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// MP4 container (default; what browsers and editors expect)
    #[default]
    Mp4,
    /// QuickTime container
    Mov,
    /// Matroska container
    Matroska,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
            OutputFormat::Matroska => "mkv",
        }
    }

    /// FFmpeg muxer name (`-f` value).
    pub fn muxer(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
            OutputFormat::Matroska => "matroska",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error parsing an [`OutputFormat`] from a string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown output format: {0}")]
pub struct UnknownFormatError(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "mov" => Ok(OutputFormat::Mov),
            "mkv" | "matroska" => Ok(OutputFormat::Matroska),
            other => Err(UnknownFormatError(other.to_string())),
        }
    }
}

/// Fixed encoding profile for a container format.
///
/// Profiles are a static table keyed by format, not computed per request:
/// every clip of a given format encodes identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputProfile {
    /// Video codec (e.g., "libx264")
    pub video_codec: &'static str,
    /// Encoding preset
    pub preset: &'static str,
    /// Constant Rate Factor (quality, 0-51, lower is better)
    pub crf: u8,
    /// Audio codec
    pub audio_codec: &'static str,
    /// Audio bitrate
    pub audio_bitrate: &'static str,
    /// Mov/mp4 muxer flags, if any
    pub movflags: Option<&'static str>,
}

impl OutputProfile {
    /// Look up the profile for a format.
    pub fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Mp4 => Self {
                video_codec: DEFAULT_VIDEO_CODEC,
                preset: DEFAULT_PRESET,
                crf: DEFAULT_CRF,
                audio_codec: DEFAULT_AUDIO_CODEC,
                audio_bitrate: DEFAULT_AUDIO_BITRATE,
                movflags: Some("+faststart"),
            },
            OutputFormat::Mov => Self {
                video_codec: DEFAULT_VIDEO_CODEC,
                preset: DEFAULT_PRESET,
                crf: DEFAULT_CRF,
                audio_codec: DEFAULT_AUDIO_CODEC,
                audio_bitrate: DEFAULT_AUDIO_BITRATE,
                movflags: Some("+faststart"),
            },
            OutputFormat::Matroska => Self {
                video_codec: DEFAULT_VIDEO_CODEC,
                preset: DEFAULT_PRESET,
                crf: DEFAULT_CRF,
                audio_codec: DEFAULT_AUDIO_CODEC,
                audio_bitrate: DEFAULT_AUDIO_BITRATE,
                movflags: None,
            },
        }
    }

    /// Convert to FFmpeg output arguments (codec, preset, quality, audio).
    pub fn to_output_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec.to_string(),
            "-preset".to_string(),
            self.preset.to_string(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.to_string(),
            "-b:a".to_string(),
            self.audio_bitrate.to_string(),
        ];

        if let Some(flags) = self.movflags {
            args.extend_from_slice(&["-movflags".to_string(), flags.to_string()]);
        }

        args
    }
}
