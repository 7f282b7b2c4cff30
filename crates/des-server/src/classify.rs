//! Log classification
//!
//! The wrapped tools do not report failures reliably through their exit
//! codes, so the verdict of a run is derived from its captured output. Both
//! classifiers are pure functions of the log text.

/// Substrings that mark a failed distcp or `hadoop fs` run.
pub const TRANSFER_ERROR_SIGNATURES: [&str; 4] = [
    "Exception in thread \"main\" java.lang.RuntimeException",
    "Job failed",
    "Access Denied",
    "Traceback",
];

/// Marker of an error line in sqoop output.
pub const ERROR_KEYWORD: &str = "ERROR";

/// `ERROR` lines containing one of these are noise, not failures.
pub const ERROR_IGNORE_LIST: [&str; 1] = ["hdfs.KeyProviderCache"];

pub const INVALID_COMMAND: &str = "command not found";

/// Counter line that carries the number of exported records.
pub const TOTAL_RECORD_COUNT: &str = "Map output records";

/// Exception raised by sqoop when its target directory already exists.
pub const FILE_EXCEPTION: &str = "FileAlreadyExistsException";

const LOCATION_START: &str = "Output directory";
const LOCATION_END: &str = "already exists";

/// Return the first transfer error signature present in `log`, if any.
pub fn detect_transfer_failure(log: &str) -> Option<&'static str> {
    TRANSFER_ERROR_SIGNATURES
        .iter()
        .copied()
        .find(|signature| log.contains(signature))
}

/// Verdict of a single sqoop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportVerdict {
    Success {
        record_count: i64,
    },
    Fail {
        error: String,
    },
    /// The target directory already exists and may be removed before a rerun.
    Retry {
        location: String,
        message: String,
        /// The offending log line, reported as-is when no rerun happens
        line: String,
    },
}

/// Classify sqoop output line by line, stopping at the first fatal line.
///
/// Without a fatal line the last record-count line decides; a log with
/// neither is a failure.
pub fn classify_export_log(log: &str) -> ExportVerdict {
    let mut verdict = ExportVerdict::Fail {
        error: format!("No `{TOTAL_RECORD_COUNT}` line in sqoop output"),
    };

    for line in log.lines() {
        if line.contains(INVALID_COMMAND) {
            return ExportVerdict::Fail {
                error: format!("FAIL: {line}"),
            };
        }

        if let Some(error_at) = line.find(ERROR_KEYWORD) {
            if ERROR_IGNORE_LIST.iter().any(|ignored| line.contains(ignored)) {
                continue;
            }
            let conflict = line
                .find(FILE_EXCEPTION)
                .filter(|position| *position > 0)
                .and_then(|_| conflicting_location(line));
            return match conflict {
                Some(location) => ExportVerdict::Retry {
                    location,
                    message: format!("Temp directory already exists: {}", &line[error_at..]),
                    line: line.to_string(),
                },
                None => ExportVerdict::Fail {
                    error: line.to_string(),
                },
            };
        }

        if let Some(position) = line.find(TOTAL_RECORD_COUNT) {
            verdict = match parse_record_count(&line[position + TOTAL_RECORD_COUNT.len()..]) {
                Some(record_count) => ExportVerdict::Success { record_count },
                None => ExportVerdict::Fail {
                    error: format!("Unparseable record count: {line}"),
                },
            };
        }
    }

    verdict
}

/// The counter is separated from its label by one character (`=` or a space).
fn parse_record_count(rest: &str) -> Option<i64> {
    let mut chars = rest.chars();
    chars.next()?;
    chars.as_str().trim().parse().ok()
}

/// The directory between the two markers; `None` unless both are present
/// and enclose a non-empty path.
fn conflicting_location(line: &str) -> Option<String> {
    let start = line.find(LOCATION_START)? + LOCATION_START.len();
    let end = start + line[start..].find(LOCATION_END)?;
    let location = line[start..end].trim();
    (!location.is_empty()).then(|| location.to_string())
}
