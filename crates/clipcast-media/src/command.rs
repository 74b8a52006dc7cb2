//! FFmpeg command builder and tool runner.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Failures from running an external tool.
///
/// Stage-agnostic; callers classify these into the pipeline error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} not found")]
    MissingBinary { tool: String },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[error("exited with status {exit_code}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("timed out after {seconds} seconds")]
    Timeout { seconds: u64, stderr: String },

    #[error("cancelled")]
    Cancelled,
}

impl ToolError {
    /// Split into a message plus the captured stderr, for mapping into
    /// stage errors.
    pub fn into_parts(self) -> (String, Option<String>) {
        match self {
            ToolError::NonZeroExit { exit_code, stderr } => (
                format!("exited with status {exit_code}"),
                non_empty(stderr),
            ),
            ToolError::Timeout { seconds, stderr } => (
                format!("timed out after {seconds} seconds"),
                non_empty(stderr),
            ),
            other => (other.to_string(), None),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string_lossy().into_owned())
}

/// Builder for FFmpeg argument lists.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek to a position before decoding the input.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Limit the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set a video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Force the container muxer. Needed when the output path's extension
    /// does not name the real container (temp render paths).
    pub fn muxer(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Set the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

enum WaitOutcome {
    Finished(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Runner for external tool invocations with timeout and cancellation.
///
/// Tool-agnostic: the same runner drives both ffprobe and ffmpeg. Captures
/// stdout (ffprobe's JSON) and stderr (diagnostics) concurrently, kills the
/// child when the timeout expires or the cancel signal flips.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner with no timeout or cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set a timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Run a tool to completion, returning its captured stdout.
    pub async fn run(&self, program: &Path, args: &[String]) -> Result<String, ToolError> {
        let tool = tool_name(program);
        debug!("running {} {}", tool, args.join(" "));

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::MissingBinary { tool });
            }
            Err(err) => return Err(ToolError::Spawn { tool, source: err }),
        };

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");

        // Drain both pipes concurrently so a chatty tool can't deadlock on a
        // full pipe buffer while we wait on it.
        let stdout_task = tokio::spawn(collect_output(stdout));
        let stderr_task = tokio::spawn(collect_output(stderr));

        let outcome = self.wait_for_completion(&mut child).await;

        match outcome {
            WaitOutcome::Finished(Ok(status)) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                if status.success() {
                    Ok(stdout)
                } else {
                    Err(ToolError::NonZeroExit {
                        exit_code: status.code().unwrap_or(-1),
                        stderr: stderr.trim().to_string(),
                    })
                }
            }
            WaitOutcome::Finished(Err(err)) => {
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                Err(ToolError::Spawn { tool, source: err })
            }
            WaitOutcome::TimedOut => {
                let seconds = self.timeout_secs.unwrap_or_default();
                warn!("{} timed out after {} seconds, killing process", tool, seconds);
                let _ = child.kill().await;
                let _ = stdout_task.await;
                let stderr = stderr_task.await.unwrap_or_default();
                Err(ToolError::Timeout {
                    seconds,
                    stderr: stderr.trim().to_string(),
                })
            }
            WaitOutcome::Cancelled => {
                info!("{} cancelled, killing process", tool);
                let _ = child.kill().await;
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                Err(ToolError::Cancelled)
            }
        }
    }

    /// Wait for the child with optional timeout and cancellation.
    async fn wait_for_completion(&self, child: &mut Child) -> WaitOutcome {
        let wait = child.wait();
        tokio::pin!(wait);

        let timeout = async {
            match self.timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timeout);

        let cancelled = async {
            match self.cancel_rx.clone() {
                Some(mut rx) => {
                    while !*rx.borrow() {
                        if rx.changed().await.is_err() {
                            // Sender gone; nobody can cancel any more.
                            std::future::pending::<()>().await;
                        }
                    }
                }
                None => std::future::pending().await,
            }
        };
        tokio::pin!(cancelled);

        tokio::select! {
            res = &mut wait => WaitOutcome::Finished(res),
            _ = &mut timeout => WaitOutcome::TimedOut,
            _ = &mut cancelled => WaitOutcome::Cancelled,
        }
    }
}

async fn collect_output<R>(stream: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_order() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(100.0)
            .duration(30.0)
            .output_args(["-c:v", "libx264"]);

        let args = cmd.build_args();

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert!(ss < i, "seek must come before the input");
        assert!(i < t, "duration limit applies to the output");

        assert_eq!(args[ss + 1], "100.000");
        assert_eq!(args[t + 1], "30.000");
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_command_muxer_and_frame() {
        let cmd = FfmpegCommand::new("in.mp4", "out.part")
            .single_frame()
            .muxer("mp4");

        let args = cmd.build_args();
        assert!(args.contains(&"-frames:v".to_string()));
        assert!(args.contains(&"-f".to_string()));
        assert!(args.contains(&"mp4".to_string()));
    }

    #[test]
    fn test_tool_error_parts() {
        let (msg, stderr) = ToolError::NonZeroExit {
            exit_code: 1,
            stderr: "  boom  ".to_string(),
        }
        .into_parts();
        assert_eq!(msg, "exited with status 1");
        assert_eq!(stderr.as_deref(), Some("boom"));

        let (msg, stderr) = ToolError::Timeout {
            seconds: 5,
            stderr: String::new(),
        }
        .into_parts();
        assert_eq!(msg, "timed out after 5 seconds");
        assert!(stderr.is_none());

        let (msg, stderr) = ToolError::Cancelled.into_parts();
        assert_eq!(msg, "cancelled");
        assert!(stderr.is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_classified() {
        let runner = FfmpegRunner::new();
        let err = runner
            .run(Path::new("/nonexistent/bin/ffprobe-missing"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingBinary { ref tool } if tool == "ffprobe-missing"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout() {
        let runner = FfmpegRunner::new();
        let out = runner
            .run(
                Path::new("/bin/sh"),
                &["-c".to_string(), "echo hello".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_captures_stderr() {
        let runner = FfmpegRunner::new();
        let err = runner
            .run(
                Path::new("/bin/sh"),
                &["-c".to_string(), "echo oops >&2; exit 7".to_string()],
            )
            .await
            .unwrap_err();
        match err {
            ToolError::NonZeroExit { exit_code, stderr } => {
                assert_eq!(exit_code, 7);
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = FfmpegRunner::new().with_timeout(Duration::from_secs(1));
        let start = std::time::Instant::now();
        let err = runner
            .run(
                Path::new("/bin/sh"),
                &["-c".to_string(), "sleep 30".to_string()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { seconds: 1, .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pre_cancelled_signal() {
        let (tx, rx) = watch::channel(true);
        let runner = FfmpegRunner::new().with_cancel(rx);
        let err = runner
            .run(
                Path::new("/bin/sh"),
                &["-c".to_string(), "sleep 30".to_string()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
        drop(tx);
    }
}
