//! Shared result types for per-artifact stages.
//!
//! Decompile and Build+Sign isolate failures per artifact: one artifact failing
//! never stops the rest, and the stage returns every outcome in input order.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::PipelineError;

/// Tool step in which a per-artifact failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Decompile,
    Build,
    Sign,
}

#[derive(Debug)]
pub struct ArtifactFailure {
    pub phase: Phase,
    pub error: PipelineError,
}

/// Outcome for one artifact of a per-artifact stage.
#[derive(Debug)]
pub struct ArtifactReport<T> {
    /// Display name (APK stem or tree name).
    pub name: String,
    pub input: PathBuf,
    pub result: Result<T, ArtifactFailure>,
}

impl<T> ArtifactReport<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Collected outcomes of a per-artifact stage, in input order.
#[derive(Debug)]
pub struct StageReport<T> {
    pub items: Vec<ArtifactReport<T>>,
}

impl<T> Default for StageReport<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> StageReport<T> {
    /// True if the stage found nothing to process.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|item| !item.succeeded())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ArtifactReport<T>> {
        self.items.iter().filter(|item| item.succeeded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtifactReport<T>> {
        self.items.iter().filter(|item| !item.succeeded())
    }

    /// Names of failed artifacts, in input order.
    pub fn failed_names(&self) -> Vec<&str> {
        self.failed().map(|item| item.name.as_str()).collect()
    }
}

/// Files produced by building and signing one decompiled tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOutput {
    pub unsigned: PathBuf,
    pub signed: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, ok: bool) -> ArtifactReport<()> {
        ArtifactReport {
            name: name.to_string(),
            input: PathBuf::from(format!("{name}.apk")),
            result: if ok {
                Ok(())
            } else {
                Err(ArtifactFailure {
                    phase: Phase::Decompile,
                    error: PipelineError::CommandFailed {
                        command: format!("apktool d {name}.apk"),
                        exit_code: Some(1),
                    },
                })
            },
        }
    }

    #[test]
    fn report_splits_successes_and_failures() {
        let report = StageReport {
            items: vec![item("a", false), item("b", true), item("c", false)],
        };
        assert!(report.has_failures());
        assert_eq!(report.failed_names(), vec!["a", "c"]);
        assert_eq!(report.succeeded().count(), 1);
    }

    #[test]
    fn empty_report_has_no_failures() {
        let report: StageReport<()> = StageReport::default();
        assert!(report.is_empty());
        assert!(!report.has_failures());
    }
}
