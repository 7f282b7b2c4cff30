//! Database export through `sqoop import`
//!
//! A job runs at most twice: when sqoop refuses to start because its target
//! directory already exists, the directory is deleted and the job rerun
//! once. A second conflict is a failure.

use des_common::types::{ExportRequest, ExportStatus};
use des_common::{Cancelled, DesError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::{classify_export_log, ExportVerdict};
use crate::command::{ensure_sqoop_command, ExportJob};
use crate::hadoop::HadoopFs;
use crate::process::{cancellable, Invocation, ProcessRunner};

/// Error reported when the target directory reappears after its deletion.
pub const PERSISTENT_CONFLICT: &str =
    "Temporary directory still exists after initial successful deletion";

/// Progress of one export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Initial,
    /// First run hit the already-exists conflict; cleanup pending
    Ran,
    /// Cleanup succeeded; second run in progress
    Retried,
    Terminal,
}

/// What the engine must do after a run has been classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    CleanupAndRetry { location: String },
    Finish(ExportStatus),
}

/// State machine deciding between finishing and the single rerun.
#[derive(Debug, Clone)]
pub struct RetryController {
    state: RetryState,
    attempts: u32,
    conflict: Option<String>,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryController {
    pub fn new() -> Self {
        Self {
            state: RetryState::Initial,
            attempts: 0,
            conflict: None,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Number of runs observed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn observe(&mut self, verdict: ExportVerdict) -> RetryDecision {
        self.attempts += 1;
        match verdict {
            ExportVerdict::Success { record_count } => {
                self.state = RetryState::Terminal;
                RetryDecision::Finish(ExportStatus::success(record_count))
            },
            ExportVerdict::Fail { error } => {
                self.state = RetryState::Terminal;
                RetryDecision::Finish(ExportStatus::failed(error))
            },
            ExportVerdict::Retry {
                location,
                message,
                line,
            } if self.state == RetryState::Initial => {
                warn!(location = %location, "{}", message);
                self.state = RetryState::Ran;
                self.conflict = Some(line);
                RetryDecision::CleanupAndRetry { location }
            },
            ExportVerdict::Retry { location, .. } => {
                let err = DesError::RetryExhausted(format!(
                    "{PERSISTENT_CONFLICT}: {location}"
                ));
                error!(error = %err, "Export target conflict persists");
                self.state = RetryState::Terminal;
                RetryDecision::Finish(ExportStatus::failed(PERSISTENT_CONFLICT))
            },
        }
    }

    /// The conflicting directory was removed; the job may run again.
    pub fn cleaned_up(&mut self) {
        if self.state == RetryState::Ran {
            self.state = RetryState::Retried;
        }
    }

    /// The conflicting directory could not be removed.
    ///
    /// The job fails with the conflicting log line itself as its error.
    pub fn cleanup_failed(&mut self, err: &DesError) -> ExportStatus {
        error!(error = %err, "Failed to delete the conflicting directory");
        self.state = RetryState::Terminal;
        ExportStatus::failed(
            self.conflict
                .take()
                .unwrap_or_else(|| err.to_string()),
        )
    }
}

#[derive(Clone)]
pub struct SqoopExport {
    fs: Arc<dyn HadoopFs>,
    runner: Arc<dyn ProcessRunner>,
    sqoop_bin: String,
}

impl std::fmt::Debug for SqoopExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqoopExport")
            .field("sqoop_bin", &self.sqoop_bin)
            .finish_non_exhaustive()
    }
}

impl SqoopExport {
    pub fn new(
        fs: Arc<dyn HadoopFs>,
        runner: Arc<dyn ProcessRunner>,
        sqoop_bin: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            runner,
            sqoop_bin: sqoop_bin.into(),
        }
    }

    /// Run one `dbexport` request to completion.
    ///
    /// Every failure becomes a `FAILED` status carrying a readable error;
    /// cancellation is the only error returned.
    pub async fn run_export(
        &self,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportStatus, Cancelled> {
        let span = info_span!(
            "export",
            job_id = %Uuid::new_v4(),
            table = request.table_name.as_deref().unwrap_or_default(),
        );

        async move {
            debug!(?request, "Executing sqoop export");

            let invocation = match self.build(request) {
                Ok(invocation) => invocation,
                Err(err) => {
                    error!(error = %err, "Export request rejected");
                    return Ok(ExportStatus::failed(failure_message(err)));
                },
            };
            debug!(command = %invocation, "Running command");

            match cancellable(cancel, self.execute(&invocation)).await {
                Ok(status) => {
                    info!(status = ?status.status, record_count = ?status.record_count, "Export finished");
                    Ok(status)
                },
                Err(DesError::Cancelled) => {
                    warn!("Export cancelled");
                    Err(Cancelled)
                },
                Err(err) => {
                    error!(error = %err, "Export failed");
                    Ok(ExportStatus::failed(err.to_string()))
                },
            }
        }
        .instrument(span)
        .await
    }

    fn build(&self, request: &ExportRequest) -> Result<Invocation, DesError> {
        let job = ExportJob::from_request(request)?;
        let invocation = job.invocation(&self.sqoop_bin);
        ensure_sqoop_command(&invocation)?;
        Ok(invocation)
    }

    async fn execute(&self, invocation: &Invocation) -> Result<ExportStatus, DesError> {
        let mut controller = RetryController::new();
        loop {
            let run = self.runner.run(invocation).await?;
            match controller.observe(classify_export_log(&run.log)) {
                RetryDecision::Finish(status) => return Ok(status),
                RetryDecision::CleanupAndRetry { location } => {
                    match self.fs.remove_recursive(&location).await {
                        Ok(()) => {
                            controller.cleaned_up();
                            info!(status = "RE-RUN", "Running the sqoop job again");
                        },
                        Err(err) => return Ok(controller.cleanup_failed(&err)),
                    }
                },
            }
        }
    }
}

fn failure_message(err: DesError) -> String {
    match err {
        DesError::InvalidRequest(message) => message,
        other => other.to_string(),
    }
}
