//! Running ffmpeg with progress reporting and cancellation.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressTracker;
use crate::{Error, Result};

/// Where ffmpeg is told to write its `-progress` blocks.
const PROGRESS_DESTINATION: &str = "pipe:1";

/// Diagnostic lines kept for the error message of a failed run.
const STDERR_TAIL: usize = 5;

/// Insert `-progress pipe:1` ahead of the trailing output argument.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `args` is empty, since there is no
/// output argument to insert before.
///
/// # Example
///
/// ```
/// use moshpit_av::inject_progress_args;
///
/// let args = vec!["-i".into(), "in.mp4".into(), "out.avi".into()];
/// let args = inject_progress_args(args)?;
/// assert_eq!(args, ["-i", "in.mp4", "-progress", "pipe:1", "out.avi"]);
/// # Ok::<(), moshpit_av::Error>(())
/// ```
pub fn inject_progress_args(mut args: Vec<String>) -> Result<Vec<String>> {
    let output = args
        .pop()
        .ok_or_else(|| Error::InvalidInput("ffmpeg arguments must end with an output".into()))?;
    args.push("-progress".into());
    args.push(PROGRESS_DESTINATION.into());
    args.push(output);
    Ok(args)
}

/// An ffmpeg executable plus an optional log file shared by its runs.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
    log_path: Option<PathBuf>,
}

/// A run started with [`Ffmpeg::spawn`].
///
/// `progress` must be drained while the run is in flight; it has room for a
/// single value, and ffmpeg's output stalls until it is read.
pub struct FfmpegRun {
    /// Progress values in `0.0..=1.0`, starting with `0.0`.
    pub progress: mpsc::Receiver<f64>,
    /// Resolves once with the run's outcome.
    pub handle: JoinHandle<Result<()>>,
}

impl FfmpegRun {
    /// Wait for the run to finish, discarding progress.
    pub async fn finish(mut self) -> Result<()> {
        while self.progress.recv().await.is_some() {}
        self.handle.await?
    }
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            log_path: None,
        }
    }

    /// Append the command line and every diagnostic line of each run to `path`.
    pub fn with_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Start a run on its own task.
    pub fn spawn(&self, args: Vec<String>, cancel: CancellationToken) -> FfmpegRun {
        self.spawn_inner(args, None, cancel)
    }

    /// Start a run on its own task, forwarding every diagnostic line to `lines`.
    pub fn spawn_with_lines(
        &self,
        args: Vec<String>,
        lines: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> FfmpegRun {
        self.spawn_inner(args, Some(lines), cancel)
    }

    fn spawn_inner(
        &self,
        args: Vec<String>,
        lines: Option<mpsc::Sender<String>>,
        cancel: CancellationToken,
    ) -> FfmpegRun {
        let (tx, rx) = mpsc::channel(1);
        let ffmpeg = self.clone();
        let handle = tokio::spawn(async move { ffmpeg.run(args, tx, lines, cancel).await });
        FfmpegRun {
            progress: rx,
            handle,
        }
    }

    /// Run ffmpeg to completion.
    ///
    /// `args` must end with the output path; `-progress pipe:1` is inserted
    /// ahead of it. A `0.0` progress value is sent as soon as the process has
    /// started, then one value per elapsed-time line. Diagnostic lines go to
    /// the log file first, then to `lines`.
    ///
    /// A dropped `progress` or `lines` receiver stops forwarding to it without
    /// affecting the run.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fires; the child is killed.
    /// - [`Error::DurationUnknown`] or [`Error::ParseError`] if ffmpeg's
    ///   output cannot be interpreted; the child is killed.
    /// - [`Error::Log`] if the log file cannot be written.
    /// - [`Error::ToolFailed`] if ffmpeg cannot be started or exits unsuccessfully.
    pub async fn run(
        &self,
        args: Vec<String>,
        progress: mpsc::Sender<f64>,
        lines: Option<mpsc::Sender<String>>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let args = inject_progress_args(args)?;
        let tool = self.tool_name();

        let mut log = match &self.log_path {
            Some(path) => Some(LogFile::open(path).await?),
            None => None,
        };
        let command_line = format!("Executing {} {}", self.program.display(), args.join(" "));
        if let Some(log) = log.as_mut() {
            log.write_line(&command_line).await?;
        }
        tracing::debug!("{command_line}");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::tool_failed(&tool, format!("failed to spawn: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool_failed(&tool, "stderr was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::tool_failed(&tool, "stdout was not captured"))?;

        let mut dispatch = Dispatch {
            tracker: ProgressTracker::new(),
            log,
            progress: Some(progress),
            lines,
            tail: VecDeque::with_capacity(STDERR_TAIL),
        };

        let pumped = dispatch
            .pump(read_lines(stderr), read_lines(stdout), &cancel)
            .await;
        if let Err(err) = pumped {
            terminate(&mut child).await;
            if let Some(log) = dispatch.log.as_mut() {
                if let Err(e) = log.flush().await {
                    tracing::debug!(error = %e, "failed to flush ffmpeg log");
                }
            }
            if matches!(err, Error::Cancelled) {
                tracing::info!("ffmpeg run cancelled");
            }
            return Err(err);
        }
        if let Some(log) = dispatch.log.as_mut() {
            log.flush().await?;
        }

        let waited = tokio::select! {
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            terminate(&mut child).await;
            return Err(Error::Cancelled);
        };
        let status = status?;

        if !status.success() {
            return Err(exit_error(&tool, status, &dispatch.tail));
        }
        tracing::debug!(%status, "ffmpeg finished");
        Ok(())
    }
}

/// Per-run state for the stderr/stdout event loop.
struct Dispatch {
    tracker: ProgressTracker,
    log: Option<LogFile>,
    progress: Option<mpsc::Sender<f64>>,
    lines: Option<mpsc::Sender<String>>,
    tail: VecDeque<String>,
}

impl Dispatch {
    async fn pump(
        &mut self,
        mut stderr: mpsc::Receiver<std::io::Result<String>>,
        mut stdout: mpsc::Receiver<std::io::Result<String>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        emit(&mut self.progress, 0.0, cancel).await?;

        let mut stderr_open = true;
        let mut stdout_open = true;
        while stderr_open || stdout_open {
            // Diagnostics first: the duration must be known before progress
            // lines that were written after it.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                line = stderr.recv(), if stderr_open => match line {
                    Some(line) => self.on_diagnostic(line?, cancel).await?,
                    None => stderr_open = false,
                },
                line = stdout.recv(), if stdout_open => match line {
                    Some(line) => {
                        if let Some(value) = self.tracker.on_progress(&line?)? {
                            emit(&mut self.progress, value, cancel).await?;
                        }
                    }
                    None => stdout_open = false,
                },
            }
        }
        Ok(())
    }

    async fn on_diagnostic(&mut self, line: String, cancel: &CancellationToken) -> Result<()> {
        if let Some(log) = self.log.as_mut() {
            log.write_line(&line).await?;
        }
        tracing::trace!(target: "moshpit_av::ffmpeg::stderr", "{line}");

        if self.tail.len() == STDERR_TAIL {
            self.tail.pop_front();
        }
        self.tail.push_back(line.clone());

        self.tracker.on_diagnostic(&line)?;
        emit(&mut self.lines, line, cancel).await
    }
}

/// Send `value` unless the receiver is gone, giving up if `cancel` fires
/// while the channel is full.
async fn emit<T>(
    tx: &mut Option<mpsc::Sender<T>>,
    value: T,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(sender) = tx.as_ref() else {
        return Ok(());
    };
    let closed = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        sent = sender.send(value) => sent.is_err(),
    };
    if closed {
        tracing::debug!("receiver dropped, no longer forwarding");
        *tx = None;
    }
    Ok(())
}

/// Read `reader` line by line on its own task.
///
/// Invalid UTF-8 is replaced rather than rejected; ffmpeg echoes file names
/// and metadata verbatim.
fn read_lines<R>(reader: R) -> mpsc::Receiver<std::io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if tx.send(Ok(line)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
    });
    rx
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "failed to kill ffmpeg");
    }
}

fn exit_error(tool: &str, status: ExitStatus, tail: &VecDeque<String>) -> Error {
    if tail.is_empty() {
        return Error::tool_failed(tool, format!("exited with {status}"));
    }
    let tail: Vec<&str> = tail.iter().map(String::as_str).collect();
    Error::tool_failed(tool, format!("exited with {status}: {}", tail.join("\n")))
}

/// Append-only ffmpeg log.
struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| Error::log(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut entry = String::with_capacity(line.len() + 1);
        entry.push_str(line);
        entry.push('\n');
        self.file
            .write_all(entry.as_bytes())
            .await
            .map_err(|e| Error::log(&self.path, e))
    }

    async fn flush(&mut self) -> Result<()> {
        self.file.flush().await.map_err(|e| Error::log(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_progress_before_output() {
        let args = vec!["-i".to_string(), "a.mp4".to_string(), "b.avi".to_string()];
        let args = inject_progress_args(args).unwrap();
        assert_eq!(args, ["-i", "a.mp4", "-progress", "pipe:1", "b.avi"]);
    }

    #[test]
    fn test_inject_progress_requires_output() {
        assert!(matches!(
            inject_progress_args(Vec::new()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_tool_name_from_path() {
        let ffmpeg = Ffmpeg::new("/usr/local/bin/ffmpeg");
        assert_eq!(ffmpeg.tool_name(), "ffmpeg");
        assert!(ffmpeg.log_path().is_none());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let ffmpeg = Ffmpeg::new("/nonexistent/ffmpeg_12345");
        let (tx, _rx) = mpsc::channel(1);
        let err = ffmpeg
            .run(vec!["out.avi".into()], tx, None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolFailed { .. }));
    }

    #[tokio::test]
    async fn test_emit_to_dropped_receiver_stops_forwarding() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut tx = Some(tx);
        emit(&mut tx, 1.0_f64, &CancellationToken::new()).await.unwrap();
        assert!(tx.is_none());
    }

    #[tokio::test]
    async fn test_emit_cancelled_while_full() {
        let (tx, _rx) = mpsc::channel(1);
        tx.send(0.0_f64).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut tx = Some(tx);
        assert!(matches!(
            emit(&mut tx, 1.0, &cancel).await,
            Err(Error::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_queued_duration_handled_before_progress() {
        for _ in 0..20 {
            let (err_tx, err_rx) = mpsc::channel(1);
            let (out_tx, out_rx) = mpsc::channel(1);
            out_tx.send(Ok("out_time_ms=5000000".to_string())).await.unwrap();
            err_tx
                .send(Ok("  Duration: 00:00:10.00, start: 0.000000".to_string()))
                .await
                .unwrap();
            drop((err_tx, out_tx));

            let (progress_tx, mut progress_rx) = mpsc::channel(4);
            let mut dispatch = Dispatch {
                tracker: ProgressTracker::new(),
                log: None,
                progress: Some(progress_tx),
                lines: None,
                tail: VecDeque::new(),
            };
            dispatch
                .pump(err_rx, out_rx, &CancellationToken::new())
                .await
                .unwrap();
            drop(dispatch);

            let mut values = Vec::new();
            while let Some(v) = progress_rx.recv().await {
                values.push(v);
            }
            assert_eq!(values, vec![0.0, 0.5]);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_error_includes_tail() {
        use std::os::unix::process::ExitStatusExt;
        let tail: VecDeque<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let err = exit_error("ffmpeg", ExitStatus::from_raw(256), &tail);
        let msg = err.to_string();
        assert!(msg.contains("ffmpeg"));
        assert!(msg.ends_with("a\nb"));
    }
}
