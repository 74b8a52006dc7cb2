//! External tool resolution.

use std::path::PathBuf;

/// Resolved paths to the external media tools.
///
/// Built once at startup and cloned into every component; never mutated
/// afterwards. A path landing here does not guarantee the binary works —
/// availability is a behavioural check on the prober/transcoder.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    /// Path to the ffprobe binary
    pub ffprobe: PathBuf,
    /// Path to the ffmpeg binary
    pub ffmpeg: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffprobe: resolve("ffprobe"),
            ffmpeg: resolve("ffmpeg"),
        }
    }
}

impl ToolPaths {
    /// Resolve tool paths from the environment.
    ///
    /// `CLIPCAST_FFPROBE_PATH` / `CLIPCAST_FFMPEG_PATH` take precedence,
    /// then PATH lookup, then the bare names (so a later PATH change can
    /// still rescue a deployment).
    pub fn from_env() -> Self {
        Self {
            ffprobe: std::env::var("CLIPCAST_FFPROBE_PATH")
                .ok()
                .map(PathBuf::from)
                .unwrap_or_else(|| resolve("ffprobe")),
            ffmpeg: std::env::var("CLIPCAST_FFMPEG_PATH")
                .ok()
                .map(PathBuf::from)
                .unwrap_or_else(|| resolve("ffmpeg")),
        }
    }

    /// Explicit paths, for tests and embedded deployments.
    pub fn explicit(ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
        }
    }
}

fn resolve(name: &str) -> PathBuf {
    which::which(name).unwrap_or_else(|_| PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_paths() {
        let tools = ToolPaths::explicit("/opt/ffprobe", "/opt/ffmpeg");
        assert_eq!(tools.ffprobe, PathBuf::from("/opt/ffprobe"));
        assert_eq!(tools.ffmpeg, PathBuf::from("/opt/ffmpeg"));
    }

    #[test]
    fn test_default_falls_back_to_bare_name() {
        // Whatever the PATH holds, resolution never fails outright.
        let tools = ToolPaths::default();
        assert!(!tools.ffprobe.as_os_str().is_empty());
        assert!(!tools.ffmpeg.as_os_str().is_empty());
    }
}
