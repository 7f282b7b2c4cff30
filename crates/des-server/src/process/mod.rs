//! External process execution
//!
//! The wrapped tools (distcp, sqoop, `hadoop fs`) report their outcome only
//! through text, so the runner's single job is to capture that text
//! completely: stdout and stderr are drained concurrently into one line
//! stream, and the run only ends once the child has exited and both pipes
//! are closed.

use async_trait::async_trait;
use des_common::DesError;
use std::fmt;
use std::future::Future;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Replacement text for secrets in the display form of a command.
pub const SECRET_MASK: &str = "*********";

/// A fully built external command.
///
/// `Display` and `Debug` render the redacted form; only
/// [`Invocation::command_line`] exposes the secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    secrets: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secrets: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Register a value that must be masked in the display form.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The exact command line, secrets included.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The command line with every registered secret replaced by [`SECRET_MASK`].
    pub fn display_line(&self) -> String {
        self.secrets
            .iter()
            .fold(self.command_line(), |line, secret| line.replace(secret, SECRET_MASK))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Invocation").field(&self.display_line()).finish()
    }
}

/// Everything a finished child process produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedRun {
    /// Combined stdout/stderr, in arrival order, newline terminated
    pub log: String,
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CapturedRun {
    pub fn new(log: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            log: log.into(),
            exit_code,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches external commands and captures their merged output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CapturedRun, DesError>;
}

/// Runs commands as real child processes on the tokio runtime.
///
/// The child is killed if the returned future is dropped, which is how
/// cancellation reaches a running tool.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// How long output keeps being collected once the child has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(200);

enum StreamMessage {
    Line(String),
    Failed(StreamKind, io::Error),
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CapturedRun, DesError> {
        let execution_error = |source: io::Error| DesError::ProcessExecution {
            command: invocation.display_line(),
            source,
        };

        let mut child = Command::new(invocation.program())
            .args(invocation.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(execution_error)?;

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, StreamKind::Stdout, sender.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, StreamKind::Stderr, sender.clone()));
        }
        drop(sender);

        let mut log = String::new();
        let mut exited = None;
        loop {
            let message = if exited.is_none() {
                tokio::select! {
                    message = receiver.recv() => message,
                    status = child.wait() => {
                        exited = Some(status.map_err(execution_error)?);
                        continue;
                    },
                }
            } else {
                // A background descendant may hold the pipes open forever.
                match tokio::time::timeout(OUTPUT_DRAIN_GRACE, receiver.recv()).await {
                    Ok(message) => message,
                    Err(_) => {
                        debug!("Child exited with its output still open, detaching readers");
                        break;
                    },
                }
            };

            match message {
                Some(StreamMessage::Line(line)) => {
                    debug!(target: "des_server::process", "{}", line.trim_end());
                    log.push_str(&line);
                    if !line.ends_with('\n') {
                        log.push('\n');
                    }
                },
                Some(StreamMessage::Failed(kind, error)) => {
                    warn!(stream = %kind, error = %error, "Failed to read child output");
                    readers.iter().for_each(JoinHandle::abort);
                    if let Err(kill_error) = child.kill().await {
                        warn!(error = %kill_error, "Failed to kill child process");
                    }
                    return Err(execution_error(error));
                },
                None => break,
            }
        }
        readers.iter().for_each(JoinHandle::abort);

        let status = match exited {
            Some(status) => status,
            None => child.wait().await.map_err(execution_error)?,
        };
        Ok(CapturedRun::new(log, status.code()))
    }
}

fn spawn_reader<R>(
    reader: R,
    kind: StreamKind,
    sender: mpsc::UnboundedSender<StreamMessage>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        loop {
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => {
                    // Partial line left over from an interrupted read.
                    if !buffer.is_empty() {
                        let _ = sender.send(StreamMessage::Line(
                            String::from_utf8_lossy(&buffer).into_owned(),
                        ));
                    }
                    break;
                },
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer).into_owned();
                    buffer.clear();
                    if sender.send(StreamMessage::Line(line)).is_err() {
                        break;
                    }
                },
                // Bytes read before the interruption stay in the buffer.
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    let _ = sender.send(StreamMessage::Failed(kind, error));
                    break;
                },
            }
        }
    })
}

/// Await `operation` unless `cancel` fires first.
///
/// On cancellation the operation future is dropped immediately and
/// [`DesError::Cancelled`] is returned.
pub async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, DesError>
where
    F: Future<Output = Result<T, DesError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DesError::Cancelled),
        result = operation => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_display_line_masks_secrets() {
        let invocation = Invocation::new("hadoop")
            .arg("distcp")
            .arg("-Dfs.s3a.awsAccessKeyId=AKIA123")
            .arg("-Dfs.s3a.awsSecretAccessKey=s3cr3t")
            .secret("AKIA123")
            .secret("s3cr3t")
            .secret("");

        assert_eq!(
            invocation.display_line(),
            "hadoop distcp -Dfs.s3a.awsAccessKeyId=********* -Dfs.s3a.awsSecretAccessKey=*********"
        );
        assert!(invocation.command_line().contains("s3cr3t"));
        assert!(!format!("{:?}", invocation).contains("s3cr3t"));
        assert!(!invocation.to_string().contains("AKIA123"));
    }

    #[tokio::test]
    async fn test_runner_merges_stdout_and_stderr() {
        let run = TokioProcessRunner
            .run(&shell("echo out-line; echo err-line 1>&2; printf 'tail'"))
            .await
            .unwrap();

        assert!(run.succeeded());
        assert!(run.log.contains("out-line\n"));
        assert!(run.log.contains("err-line\n"));
        assert!(run.log.contains("tail\n"));
    }

    #[tokio::test]
    async fn test_runner_reports_exit_code_without_judging_it() {
        let run = TokioProcessRunner
            .run(&shell("echo Job failed; exit 3"))
            .await
            .unwrap();

        assert_eq!(run.exit_code, Some(3));
        assert!(run.log.contains("Job failed"));
    }

    #[tokio::test]
    async fn test_runner_spawn_failure_is_execution_error() {
        let err = TokioProcessRunner
            .run(&Invocation::new("/nonexistent/des-tool").secret("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DesError::ProcessExecution { .. }));
    }

    #[tokio::test]
    async fn test_runner_drains_large_output_on_both_streams() {
        let run = TokioProcessRunner
            .run(&shell(
                "i=0; while [ $i -lt 2000 ]; do echo o$i; echo e$i 1>&2; i=$((i+1)); done",
            ))
            .await
            .unwrap();

        assert_eq!(run.log.lines().count(), 4000);
    }

    #[tokio::test]
    async fn test_runner_returns_when_child_exits_before_its_descendants() {
        let started = std::time::Instant::now();
        let run = tokio::time::timeout(
            Duration::from_secs(20),
            TokioProcessRunner.run(&shell("sleep 30 & echo done; exit 0")),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(run.exit_code, Some(0));
        assert!(run.log.contains("done\n"));
    }

    #[tokio::test]
    async fn test_cancellable_stops_waiting() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), DesError> = cancellable(&cancel, async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(DesError::Cancelled)));
    }
}
