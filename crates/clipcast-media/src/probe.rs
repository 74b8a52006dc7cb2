//! FFprobe metadata extraction.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use clipcast_models::VideoMetadata;

use crate::command::{FfmpegRunner, ToolError};
use crate::error::{PipelineError, PipelineResult};
use crate::tools::ToolPaths;

/// Fallback frame rate when the probe reports none.
const DEFAULT_FRAME_RATE: &str = "30/1";

/// Path used for the behavioural availability check. Guaranteed to not
/// exist, so an installed tool reports a file error rather than succeeding.
const AVAILABILITY_PROBE_PATH: &str = "/nonexistent/clipcast-availability-check.mp4";

/// Default probe timeout.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Probes media files via the external ffprobe binary.
#[derive(Debug, Clone)]
pub struct Prober {
    tools: ToolPaths,
    timeout: Duration,
}

impl Prober {
    /// Create a prober with the default timeout.
    pub fn new(tools: ToolPaths) -> Self {
        Self {
            tools,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Override the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe a video file for metadata.
    ///
    /// Fails `InputNotFound` before spawning anything when the path does not
    /// exist, and `NoVideoStream` when the file has only non-video streams.
    pub async fn probe(&self, path: impl AsRef<Path>) -> PipelineResult<VideoMetadata> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PipelineError::input_not_found(path));
        }

        let runner = FfmpegRunner::new().with_timeout(self.timeout);
        let stdout = runner
            .run(&self.tools.ffprobe, &probe_args(path))
            .await
            .map_err(|err| PipelineError::from_probe_tool(path, err))?;

        parse_metadata(path, &stdout)
    }

    /// Whether the probe binary is installed and runnable.
    ///
    /// Probes a deliberately nonexistent path: a tool that reports a file
    /// error is installed; only a missing or unspawnable binary counts as
    /// unavailable.
    pub async fn is_available(&self) -> bool {
        let runner = FfmpegRunner::new().with_timeout(self.timeout);
        let result = runner
            .run(
                &self.tools.ffprobe,
                &probe_args(Path::new(AVAILABILITY_PROBE_PATH)),
            )
            .await;

        match result {
            Ok(_) | Err(ToolError::NonZeroExit { .. }) | Err(ToolError::Timeout { .. }) => true,
            Err(err) => {
                debug!("ffprobe unavailable: {err}");
                false
            }
        }
    }
}

fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Parse ffprobe's JSON into metadata. Pure so it is testable without the
/// binary installed.
fn parse_metadata(path: &Path, json: &str) -> PipelineResult<VideoMetadata> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|err| PipelineError::probe_failed(path, format!("invalid probe output: {err}"), None))?;

    // First video stream is authoritative
    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| PipelineError::no_video_stream(path))?;

    // Duration: container first, then the stream's own field, then unknown
    let duration_seconds = parse_f64(&probe.format.duration)
        .or_else(|| parse_f64(&video_stream.duration))
        .unwrap_or(0.0);

    // Frame rate: real rate first, then average, skipping "0/0" placeholders
    let frame_rate = [&video_stream.r_frame_rate, &video_stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .find(|rate| rate_is_positive(rate))
        .cloned()
        .unwrap_or_else(|| DEFAULT_FRAME_RATE.to_string());

    let bitrate_bps = parse_u64(&probe.format.bit_rate)
        .or_else(|| parse_u64(&video_stream.bit_rate))
        .unwrap_or(0);

    Ok(VideoMetadata {
        duration_seconds,
        width: video_stream.width.unwrap_or(1920),
        height: video_stream.height.unwrap_or(1080),
        codec_name: video_stream.codec_name.clone().unwrap_or_default(),
        frame_rate,
        bitrate_bps,
        container_format: probe.format.format_name.clone().unwrap_or_default(),
    })
}

fn parse_f64(value: &Option<String>) -> Option<f64> {
    value.as_ref().and_then(|v| v.parse().ok())
}

fn parse_u64(value: &Option<String>) -> Option<u64> {
    value.as_ref().and_then(|v| v.parse().ok())
}

fn rate_is_positive(rate: &str) -> bool {
    if let Some((num, den)) = rate.split_once('/') {
        return matches!(
            (num.parse::<f64>(), den.parse::<f64>()),
            (Ok(n), Ok(d)) if n > 0.0 && d > 0.0
        );
    }
    rate.parse::<f64>().map(|v| v > 0.0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_json(format: &str, streams: &str) -> String {
        format!("{{\"format\":{format},\"streams\":{streams}}}")
    }

    #[test]
    fn test_parse_full_metadata() {
        let json = probe_json(
            r#"{"duration":"300.25","bit_rate":"6000000","format_name":"mov,mp4,m4a,3gp,3g2,mj2"}"#,
            r#"[{"codec_type":"video","codec_name":"h264","width":2560,"height":1440,"r_frame_rate":"60/1","avg_frame_rate":"60/1"}]"#,
        );

        let meta = parse_metadata(Path::new("/buf.mp4"), &json).unwrap();
        assert!((meta.duration_seconds - 300.25).abs() < 1e-9);
        assert_eq!(meta.width, 2560);
        assert_eq!(meta.height, 1440);
        assert_eq!(meta.codec_name, "h264");
        assert_eq!(meta.frame_rate, "60/1");
        assert_eq!(meta.bitrate_bps, 6_000_000);
        assert_eq!(meta.container_format, "mov,mp4,m4a,3gp,3g2,mj2");
    }

    #[test]
    fn test_no_video_stream() {
        let json = probe_json(
            r#"{"duration":"10.0"}"#,
            r#"[{"codec_type":"audio","codec_name":"aac"}]"#,
        );

        let err = parse_metadata(Path::new("/audio.m4a"), &json).unwrap_err();
        assert_eq!(err.kind(), "no_video_stream");
    }

    #[test]
    fn test_first_video_stream_wins() {
        let json = probe_json(
            r#"{}"#,
            r#"[
                {"codec_type":"audio","codec_name":"aac"},
                {"codec_type":"video","codec_name":"h264","width":1280,"height":720},
                {"codec_type":"video","codec_name":"mjpeg","width":320,"height":240}
            ]"#,
        );

        let meta = parse_metadata(Path::new("/buf.mkv"), &json).unwrap();
        assert_eq!(meta.codec_name, "h264");
        assert_eq!(meta.width, 1280);
    }

    #[test]
    fn test_duration_falls_back_to_stream() {
        let json = probe_json(
            r#"{"format_name":"matroska,webm"}"#,
            r#"[{"codec_type":"video","codec_name":"h264","duration":"42.5"}]"#,
        );

        let meta = parse_metadata(Path::new("/buf.mkv"), &json).unwrap();
        assert!((meta.duration_seconds - 42.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_duration_is_zero() {
        let json = probe_json(
            r#"{"format_name":"matroska,webm"}"#,
            r#"[{"codec_type":"video","codec_name":"h264"}]"#,
        );

        let meta = parse_metadata(Path::new("/buf.mkv"), &json).unwrap();
        assert_eq!(meta.duration_seconds, 0.0);
        assert!(!meta.has_duration());
    }

    #[test]
    fn test_frame_rate_prefers_real_rate() {
        let json = probe_json(
            r#"{}"#,
            r#"[{"codec_type":"video","r_frame_rate":"60/1","avg_frame_rate":"59/1"}]"#,
        );

        let meta = parse_metadata(Path::new("/buf.mp4"), &json).unwrap();
        assert_eq!(meta.frame_rate, "60/1");
    }

    #[test]
    fn test_frame_rate_skips_zero_ratio() {
        let json = probe_json(
            r#"{}"#,
            r#"[{"codec_type":"video","r_frame_rate":"0/0","avg_frame_rate":"30000/1001"}]"#,
        );

        let meta = parse_metadata(Path::new("/buf.mp4"), &json).unwrap();
        assert_eq!(meta.frame_rate, "30000/1001");
    }

    #[test]
    fn test_frame_rate_default_when_absent() {
        let json = probe_json(r#"{}"#, r#"[{"codec_type":"video"}]"#);

        let meta = parse_metadata(Path::new("/buf.mp4"), &json).unwrap();
        assert_eq!(meta.frame_rate, "30/1");
    }

    #[test]
    fn test_dimension_defaults() {
        let json = probe_json(r#"{}"#, r#"[{"codec_type":"video"}]"#);

        let meta = parse_metadata(Path::new("/buf.mp4"), &json).unwrap();
        assert_eq!(meta.width, 1920);
        assert_eq!(meta.height, 1080);
    }

    #[test]
    fn test_bitrate_falls_back_to_stream() {
        let json = probe_json(
            r#"{}"#,
            r#"[{"codec_type":"video","bit_rate":"2500000"}]"#,
        );

        let meta = parse_metadata(Path::new("/buf.mp4"), &json).unwrap();
        assert_eq!(meta.bitrate_bps, 2_500_000);
    }

    #[test]
    fn test_garbage_json_is_probe_failed() {
        let err = parse_metadata(Path::new("/buf.mp4"), "not json at all").unwrap_err();
        assert_eq!(err.kind(), "probe_failed");
    }

    #[tokio::test]
    async fn test_probe_missing_input_short_circuits() {
        // A bogus tool path would fail the run, so reaching InputNotFound
        // proves nothing was spawned.
        let prober = Prober::new(ToolPaths::explicit("/nonexistent/ffprobe", "/nonexistent/ffmpeg"));
        let err = prober.probe("/definitely/not/here.mp4").await.unwrap_err();
        assert_eq!(err.kind(), "input_not_found");
    }

    #[tokio::test]
    async fn test_unavailable_when_binary_missing() {
        let prober = Prober::new(ToolPaths::explicit("/nonexistent/ffprobe", "/nonexistent/ffmpeg"));
        assert!(!prober.is_available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_available_when_tool_reports_error() {
        // Any runnable binary that complains about the bogus input counts as
        // installed; /bin/sh exits non-zero on these args.
        let prober = Prober::new(ToolPaths::explicit("/bin/sh", "/bin/sh"));
        assert!(prober.is_available().await);
    }
}
