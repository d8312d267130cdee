//! Typed failures reported by stage operations.
//!
//! Empty enumerations ("no APKs found", "no signed APKs found") are not errors;
//! they are outcome variants on the stage results. Everything here is a real
//! failure that the driver maps to a non-zero exit code.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// External tool exited with a non-zero status.
    #[error("command failed ({}): {command}", describe_exit(*exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("command timed out after {}s: {command}", timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input {}: {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },

    #[error("directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    /// Signer exited successfully but the `-aligned-debugSigned.apk` file is absent.
    #[error("signer produced no output, expected {}", expected.display())]
    SignedArtifactMissing { expected: PathBuf },

    #[error(
        "pull aborted at {failed_remote} after {} of the package's APKs were pulled",
        pulled.len()
    )]
    PullAborted {
        failed_remote: String,
        pulled: Vec<PathBuf>,
        #[source]
        source: Box<PipelineError>,
    },

    #[error(
        "{} bundles found, select one with --bundle: {}",
        candidates.len(),
        join_paths(candidates)
    )]
    AmbiguousBundle { candidates: Vec<PathBuf> },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable name, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CommandFailed { .. } => "command_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Spawn { .. } => "spawn",
            Self::InvalidInput { .. } => "invalid_input",
            Self::DirectoryNotFound { .. } => "directory_not_found",
            Self::SignedArtifactMissing { .. } => "signed_artifact_missing",
            Self::PullAborted { .. } => "pull_aborted",
            Self::AmbiguousBundle { .. } => "ambiguous_bundle",
            Self::Io { .. } => "io",
        }
    }

    /// True for errors caused by what the operator asked for rather than by a tool.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::DirectoryNotFound { .. }
                | Self::AmbiguousBundle { .. }
        )
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_message_carries_full_command() {
        let err = PipelineError::CommandFailed {
            command: "adb pull /data/app/base.apk out/base.apk".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(
            err.to_string(),
            "command failed (exit code 1): adb pull /data/app/base.apk out/base.apk"
        );
    }

    #[test]
    fn signal_exit_is_described() {
        let err = PipelineError::CommandFailed {
            command: "apktool b app".to_string(),
            exit_code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn usage_errors_are_classified() {
        assert!(PipelineError::invalid_input("a.txt", "not an APK").is_usage_error());
        assert!(
            PipelineError::DirectoryNotFound {
                path: PathBuf::from("missing")
            }
            .is_usage_error()
        );
        assert!(
            !PipelineError::CommandFailed {
                command: "adb".to_string(),
                exit_code: Some(1)
            }
            .is_usage_error()
        );
    }
}
