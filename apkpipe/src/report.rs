//! Rendering of stage results for the operator, as text or JSON.
//!
//! Stage operations never print. The driver turns their results into a
//! [`Rendered`] report, which also decides the process exit code.

use std::error::Error as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::core::lineage::WorkdirSummary;
use crate::core::types::{SignedOutput, StageReport};
use crate::error::PipelineError;
use crate::exit_codes;
use crate::install::InstallOutcome;
use crate::pull::PullOutcome;
use crate::universal::UniversalOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// A finished stage, ready to print.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub json: Value,
    pub exit_code: i32,
}

impl Rendered {
    fn ok(text: String, json: Value) -> Self {
        Self {
            text,
            json,
            exit_code: exit_codes::OK,
        }
    }

    /// Print to stdout, or to stderr for failures in text mode.
    pub fn emit(&self, format: OutputFormat) {
        let payload = match format {
            OutputFormat::Json => {
                let mut s = serde_json::to_string_pretty(&self.json).unwrap_or_default();
                s.push('\n');
                s
            }
            OutputFormat::Text => self.text.clone(),
        };
        let result = if self.exit_code == exit_codes::OK || format == OutputFormat::Json {
            std::io::stdout().lock().write_all(payload.as_bytes())
        } else {
            std::io::stderr().lock().write_all(payload.as_bytes())
        };
        if let Err(e) = result {
            tracing::warn!(err = %e, "failed to write report");
        }
    }
}

/// Per-artifact output shown in the report.
pub trait ArtifactOutput {
    fn describe(&self) -> String;
    fn to_json(&self) -> Value;
}

impl ArtifactOutput for PathBuf {
    fn describe(&self) -> String {
        self.display().to_string()
    }

    fn to_json(&self) -> Value {
        json!({ "output": path_str(self) })
    }
}

impl ArtifactOutput for SignedOutput {
    fn describe(&self) -> String {
        self.signed.display().to_string()
    }

    fn to_json(&self) -> Value {
        json!({ "unsigned": path_str(&self.unsigned), "signed": path_str(&self.signed) })
    }
}

pub fn packages(packages: &[String]) -> Rendered {
    let mut text = String::new();
    for pkg in packages {
        text.push_str(pkg);
        text.push('\n');
    }
    Rendered::ok(text, json!({ "stage": "list", "packages": packages }))
}

pub fn pull(outcome: &PullOutcome) -> Rendered {
    match outcome {
        PullOutcome::NoApks { package } => Rendered::ok(
            format!("No APKs found for package: {package}\n"),
            json!({ "stage": "pull", "status": "no_apks", "package": package }),
        ),
        PullOutcome::Pulled(artifacts) => {
            let mut text = format!("pull: pulled={}\n", artifacts.len());
            for a in artifacts {
                text.push_str(&format!(" - {} -> {}\n", a.remote, a.local.display()));
            }
            let items: Vec<Value> = artifacts
                .iter()
                .map(|a| json!({ "remote": a.remote, "local": path_str(&a.local) }))
                .collect();
            Rendered::ok(
                text,
                json!({ "stage": "pull", "status": "ok", "artifacts": items }),
            )
        }
    }
}

/// Report for a per-artifact stage. Exits non-zero if any artifact failed.
pub fn artifacts<T: ArtifactOutput>(
    stage: &str,
    empty_message: &str,
    report: &StageReport<T>,
) -> Rendered {
    if report.is_empty() {
        return Rendered::ok(
            format!("{empty_message}\n"),
            json!({ "stage": stage, "status": "empty", "items": [] }),
        );
    }

    let succeeded = report.succeeded().count();
    let failed = report.items.len() - succeeded;
    let mut text = format!("{stage}: succeeded={succeeded} failed={failed}\n");
    let mut items = Vec::with_capacity(report.items.len());
    for item in &report.items {
        match &item.result {
            Ok(output) => {
                text.push_str(&format!(
                    " ok     {} -> {}\n",
                    item.input.display(),
                    output.describe()
                ));
                let mut value = json!({
                    "name": item.name,
                    "input": path_str(&item.input),
                    "status": "ok",
                });
                merge(&mut value, output.to_json());
                items.push(value);
            }
            Err(failure) => {
                text.push_str(&format!(
                    " failed {} ({:?}): {}\n",
                    item.input.display(),
                    failure.phase,
                    error_chain(&failure.error)
                ));
                items.push(json!({
                    "name": item.name,
                    "input": path_str(&item.input),
                    "status": "failed",
                    "phase": failure.phase,
                    "error": error_json(&failure.error),
                }));
            }
        }
    }
    if failed > 0 {
        let names: Vec<&str> = report.failed_names();
        text.push_str(&format!("{stage}: failed artifacts: {}\n", names.join(", ")));
    }

    Rendered {
        text,
        json: json!({
            "stage": stage,
            "status": if failed > 0 { "failed" } else { "ok" },
            "items": items,
        }),
        exit_code: if failed > 0 {
            exit_codes::FAILED
        } else {
            exit_codes::OK
        },
    }
}

pub fn install(outcome: &InstallOutcome) -> Rendered {
    match outcome {
        InstallOutcome::NoSignedApks => Rendered::ok(
            "No signed APKs found.\n".to_string(),
            json!({ "stage": "install", "status": "no_signed_apks" }),
        ),
        InstallOutcome::Installed { apks } => {
            let mut text = format!("install: installed={}\n", apks.len());
            for apk in apks {
                text.push_str(&format!(" - {}\n", apk.display()));
            }
            let apks: Vec<String> = apks.iter().map(|p| path_str(p)).collect();
            Rendered::ok(
                text,
                json!({ "stage": "install", "status": "ok", "apks": apks }),
            )
        }
    }
}

pub fn universal(outcome: &UniversalOutcome) -> Rendered {
    match outcome {
        UniversalOutcome::NoBundle => Rendered::ok(
            "No AAB files found. Universal build requires an Android App Bundle (.aab) file.\n"
                .to_string(),
            json!({ "stage": "universal", "status": "no_bundle" }),
        ),
        UniversalOutcome::Built { bundle, output } => Rendered::ok(
            format!(
                "universal: bundle={} output={}\n",
                bundle.display(),
                output.display()
            ),
            json!({
                "stage": "universal",
                "status": "ok",
                "bundle": path_str(bundle),
                "output": path_str(output),
            }),
        ),
    }
}

pub fn status(root: &Path, summary: &WorkdirSummary) -> Rendered {
    let mut text = format!("status: workdir={}\n", root.display());
    for (label, names) in [
        ("raw", &summary.raw),
        ("trees", &summary.trees),
        ("unsigned", &summary.unsigned),
        ("signed", &summary.signed),
        ("bundles", &summary.bundles),
    ] {
        text.push_str(&format!("{label}: {}\n", names.len()));
    }
    for lineage in &summary.lineages {
        text.push_str(&format!(" {} {:?}\n", lineage.apk, lineage.stage));
    }
    let mut value = serde_json::to_value(summary).unwrap_or(Value::Null);
    merge(
        &mut value,
        json!({ "stage": "status", "workdir": path_str(root) }),
    );
    Rendered::ok(text, value)
}

/// Report for a stage that stopped with an error.
pub fn failure(stage: &str, err: &PipelineError) -> Rendered {
    let mut text = format!("{stage}: error: {}\n", error_chain(err));
    if let PipelineError::PullAborted { pulled, .. } = err {
        for path in pulled {
            text.push_str(&format!("{stage}: pulled before failure: {}\n", path.display()));
        }
    }
    Rendered {
        text,
        json: json!({ "stage": stage, "status": "error", "error": error_json(err) }),
        exit_code: if err.is_usage_error() {
            exit_codes::INVALID
        } else {
            exit_codes::FAILED
        },
    }
}

fn error_json(err: &PipelineError) -> Value {
    let mut value = json!({ "kind": err.kind(), "message": error_chain(err) });
    if let PipelineError::PullAborted { pulled, .. } = err {
        let pulled: Vec<String> = pulled.iter().map(|p| path_str(p)).collect();
        merge(&mut value, json!({ "pulled": pulled }));
    }
    value
}

/// Display an error followed by its sources, `outer: inner: ...`.
fn error_chain(err: &PipelineError) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

fn merge(target: &mut Value, extra: Value) {
    if let (Value::Object(target), Value::Object(extra)) = (target, extra) {
        target.extend(extra);
    }
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ArtifactFailure, ArtifactReport, Phase};
    use crate::pull::PulledArtifact;

    fn decompile_report() -> StageReport<PathBuf> {
        StageReport {
            items: vec![
                ArtifactReport {
                    name: "a".to_string(),
                    input: PathBuf::from("w/a.apk"),
                    result: Err(ArtifactFailure {
                        phase: Phase::Decompile,
                        error: PipelineError::CommandFailed {
                            command: "apktool d w/a.apk -o w/a -f".to_string(),
                            exit_code: Some(1),
                        },
                    }),
                },
                ArtifactReport {
                    name: "b".to_string(),
                    input: PathBuf::from("w/b.apk"),
                    result: Ok(PathBuf::from("w/b")),
                },
            ],
        }
    }

    #[test]
    fn artifact_report_lists_failures_and_exits_non_zero() {
        let rendered = artifacts("decompile", "No APK files found", &decompile_report());
        assert_eq!(rendered.exit_code, exit_codes::FAILED);
        assert!(rendered.text.contains("succeeded=1 failed=1"));
        assert!(rendered.text.contains("failed artifacts: a"));
        assert_eq!(rendered.json["items"][0]["status"], "failed");
        assert_eq!(rendered.json["items"][0]["phase"], "decompile");
        assert_eq!(rendered.json["items"][0]["error"]["kind"], "command_failed");
        assert_eq!(rendered.json["items"][0]["input"], "w/a.apk");
        assert!(rendered.text.contains(" failed w/a.apk (Decompile):"));
        assert!(rendered.text.contains(" ok     w/b.apk -> w/b"));
        assert_eq!(rendered.json["items"][1]["output"], "w/b");
    }

    #[test]
    fn empty_stage_is_ok() {
        let report: StageReport<PathBuf> = StageReport::default();
        let rendered = artifacts("decompile", "No APK files found in directory: w", &report);
        assert_eq!(rendered.exit_code, exit_codes::OK);
        assert_eq!(rendered.text, "No APK files found in directory: w\n");
    }

    #[test]
    fn pull_abort_lists_pulled_paths_and_cause() {
        let err = PipelineError::PullAborted {
            failed_remote: "/data/app/a/split.apk".to_string(),
            pulled: vec![PathBuf::from("w/base.apk")],
            source: Box::new(PipelineError::CommandFailed {
                command: "adb pull /data/app/a/split.apk w/split.apk".to_string(),
                exit_code: Some(1),
            }),
        };
        let rendered = failure("pull", &err);
        assert_eq!(rendered.exit_code, exit_codes::FAILED);
        assert!(rendered.text.contains("adb pull /data/app/a/split.apk"));
        assert!(rendered.text.contains("pulled before failure: w/base.apk"));
        assert_eq!(rendered.json["error"]["pulled"][0], "w/base.apk");
    }

    #[test]
    fn usage_errors_map_to_invalid() {
        let err = PipelineError::DirectoryNotFound {
            path: PathBuf::from("workdir"),
        };
        assert_eq!(failure("build", &err).exit_code, exit_codes::INVALID);
    }

    #[test]
    fn pull_and_install_messages() {
        let rendered = pull(&PullOutcome::NoApks {
            package: "com.example.app".to_string(),
        });
        assert_eq!(rendered.text, "No APKs found for package: com.example.app\n");

        let rendered = pull(&PullOutcome::Pulled(vec![PulledArtifact {
            remote: "/data/app/a/base.apk".to_string(),
            local: PathBuf::from("w/base.apk"),
        }]));
        assert!(rendered.text.contains("/data/app/a/base.apk -> w/base.apk"));

        let rendered = install(&InstallOutcome::NoSignedApks);
        assert_eq!(rendered.text, "No signed APKs found.\n");
        assert_eq!(rendered.exit_code, exit_codes::OK);
    }
}
