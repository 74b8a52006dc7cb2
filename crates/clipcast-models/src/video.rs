//! Probed video metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata for a video file as reported by the probe tool.
///
/// Produced fresh for every probe; replay buffers grow while recording, so
/// cached values go stale immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Duration in seconds. `0.0` when the container does not report one.
    pub duration_seconds: f64,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Video codec name (e.g. "h264")
    pub codec_name: String,

    /// Frame rate as a rational string (e.g. "60/1")
    pub frame_rate: String,

    /// Overall bitrate in bits per second. `0` when unreported.
    pub bitrate_bps: u64,

    /// Container format name (e.g. "mov,mp4,m4a,3gp,3g2,mj2")
    pub container_format: String,
}

impl VideoMetadata {
    /// Frame rate in frames per second, parsed from the rational string.
    ///
    /// Falls back to 30.0 when the string is malformed.
    pub fn fps(&self) -> f64 {
        parse_frame_rate(&self.frame_rate).unwrap_or(30.0)
    }

    /// Whether the probe reported a usable duration.
    pub fn has_duration(&self) -> bool {
        self.duration_seconds > 0.0
    }
}

impl Default for VideoMetadata {
    fn default() -> Self {
        Self {
            duration_seconds: 0.0,
            width: 1920,
            height: 1080,
            codec_name: String::new(),
            frame_rate: "30/1".to_string(),
            bitrate_bps: 0,
            container_format: String::new(),
        }
    }
}

/// Parse a frame rate string (e.g. "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_from_rational() {
        let meta = VideoMetadata {
            frame_rate: "60/1".to_string(),
            ..Default::default()
        };
        assert!((meta.fps() - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_fps_from_ntsc_rational() {
        let meta = VideoMetadata {
            frame_rate: "30000/1001".to_string(),
            ..Default::default()
        };
        assert!((meta.fps() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_fps_from_decimal() {
        let meta = VideoMetadata {
            frame_rate: "23.976".to_string(),
            ..Default::default()
        };
        assert!((meta.fps() - 23.976).abs() < 0.001);
    }

    #[test]
    fn test_fps_fallback_on_garbage() {
        let meta = VideoMetadata {
            frame_rate: "n/a".to_string(),
            ..Default::default()
        };
        assert!((meta.fps() - 30.0).abs() < 0.01);

        let zero_den = VideoMetadata {
            frame_rate: "30/0".to_string(),
            ..Default::default()
        };
        assert!((zero_den.fps() - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_has_duration() {
        let meta = VideoMetadata::default();
        assert!(!meta.has_duration());

        let meta = VideoMetadata {
            duration_seconds: 12.5,
            ..Default::default()
        };
        assert!(meta.has_duration());
    }
}
