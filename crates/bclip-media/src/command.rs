//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use bclip_models::EncodingConfig;

use crate::error::{tail_lines, MediaError, MediaResult, STDERR_TAIL_LINES};
use crate::locator::ToolPath;

/// One `-i` input with the arguments that precede it.
#[derive(Debug, Clone)]
struct CommandInput {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<CommandInput>,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Output target (a path, or "-" for the null muxer)
    output: String,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_string_lossy().to_string(),
            overwrite: true,
        }
    }

    /// Create a decode-only command that discards its output.
    pub fn null_output() -> Self {
        Self::new("-").output_arg("-f").output_arg("null")
    }

    /// Add an input file.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), path)
    }

    /// Add an input file preceded by input options (e.g. `-ss`, `-f concat`).
    pub fn input_with<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(CommandInput {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add output arguments (after -i).
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

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Stop at the end of the shortest mapped stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Copy all streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Apply an encoding configuration.
    pub fn encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.to_ffmpeg_args())
    }

    /// Move the moov atom to the front.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());

        args.push("-v".to_string());
        args.push("error".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());

        args
    }
}

/// Captured result of one external invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Last lines of the diagnostic stream.
    pub fn stderr_tail(&self) -> String {
        tail_lines(&self.stderr, STDERR_TAIL_LINES)
    }
}

/// Runs an external tool under a hard wall-clock timeout.
///
/// The child is started in its own process group; on timeout the whole
/// group is killed rather than just abandoning the wait. The deadline
/// covers draining both pipes, so a descendant that keeps them open after
/// the tool exits still counts against it.
#[derive(Debug, Clone, Copy)]
pub struct ToolRunner {
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run an FFmpeg command built with [`FfmpegCommand`].
    pub async fn run_ffmpeg(&self, tool: &ToolPath, cmd: &FfmpegCommand) -> MediaResult<ToolOutput> {
        self.run(tool, &cmd.build_args()).await
    }

    /// Run `tool` with `args`, capturing stdout and stderr.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ToolOutput::success`].
    pub async fn run(&self, tool: &ToolPath, args: &[String]) -> MediaResult<ToolOutput> {
        debug!("Running {}: {} {}", tool.name(), tool, args.join(" "));

        let mut command = Command::new(tool.as_path());
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let started = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::ToolNotFound(tool.name())
            } else {
                MediaError::Io(e)
            }
        })?;
        let pid = child.id();

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let mut stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let mut stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let finished = tokio::time::timeout(self.timeout, async {
            let status = child.wait().await?;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(collected) => collected?,
            Err(_) => {
                let secs = self.timeout.as_secs();
                warn!(
                    "{} timed out after {} seconds, killing process group",
                    tool.name(),
                    secs
                );
                kill_process_group(pid);
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(MediaError::Timeout {
                    tool: tool.name(),
                    secs,
                });
            }
        };

        let elapsed = started.elapsed();

        metrics::histogram!("bclip_tool_duration_seconds", "tool" => tool.name())
            .record(elapsed.as_secs_f64());

        Ok(ToolOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            elapsed,
        })
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("output.mp4")
            .input("input.mp4")
            .input("overlay.mp4")
            .filter_complex("[0:v][1:v]overlay[v]")
            .map("[v]")
            .map("0:a?")
            .shortest();

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        let first_input = args.iter().position(|a| a == "input.mp4").unwrap();
        let second_input = args.iter().position(|a| a == "overlay.mp4").unwrap();
        assert!(first_input < second_input);
        assert!(args.contains(&"0:a?".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp4");
    }

    #[test]
    fn test_input_options_precede_input() {
        let args = FfmpegCommand::new("out.mp4")
            .input_with(["-f", "concat", "-safe", "0"], "list.txt")
            .codec_copy()
            .build_args();

        let concat = args.iter().position(|a| a == "concat").unwrap();
        let list = args.iter().position(|a| a == "list.txt").unwrap();
        assert!(concat < list);
        assert_eq!(args[list - 1], "-i");
    }

    #[test]
    fn test_null_output() {
        let args = FfmpegCommand::null_output().input("out.mp4").build_args();
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], "null");
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_duration_format() {
        let args = FfmpegCommand::new("o.mp4").input("i.mp4").duration(3.0).build_args();
        assert!(args.contains(&"3.000".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_exit_status() {
        let runner = ToolRunner::new(Duration::from_secs(5));
        let ok = runner.run(&ToolPath::new("true"), &[]).await.unwrap();
        assert!(ok.success());

        let failed = runner.run(&ToolPath::new("false"), &[]).await.unwrap();
        assert!(!failed.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out_and_kills() {
        let runner = ToolRunner::new(Duration::from_millis(300));
        let started = Instant::now();

        let err = runner
            .run(&ToolPath::new("sleep"), &["30".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out_when_descendant_holds_pipes() {
        let runner = ToolRunner::new(Duration::from_secs(1));
        let started = Instant::now();

        // The shell exits at once; the backgrounded sleep inherits stdout.
        let args = ["-c".to_string(), "sleep 6 & exit 0".to_string()];
        let err = runner.run(&ToolPath::new("sh"), &args).await.unwrap_err();

        assert!(matches!(err, MediaError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let runner = ToolRunner::new(Duration::from_secs(5));
        let err = runner
            .run(&ToolPath::new("bclip-definitely-missing-binary"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }
}
