//! Decompile stage: decode APKs into editable trees.
//!
//! Works on one APK file or on every `*.apk` directly inside a directory.
//! Each APK is independent: a failed decode is recorded and the rest carry on.

use std::path::{Path, PathBuf};

use tracing::{info, info_span, instrument, warn};

use crate::batch::map_bounded;
use crate::core::naming::{is_apk_name, tree_name};
use crate::core::types::{ArtifactFailure, ArtifactReport, Phase, StageReport};
use crate::error::{PipelineError, PipelineResult};
use crate::io::process::ToolRunner;
use crate::io::tools::Toolchain;
use crate::io::workdir::WorkDir;

/// What the decompile stage was pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompileTarget {
    File(PathBuf),
    Directory(PathBuf),
}

impl DecompileTarget {
    /// Existing directories select directory mode. Regular files and paths
    /// named `*.apk` select single-file mode, so a missing or non-APK file is
    /// rejected as invalid input rather than as a missing directory.
    pub fn resolve(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            return Self::Directory(path);
        }
        let named_apk = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_apk_name);
        if named_apk || path.is_file() {
            Self::File(path)
        } else {
            Self::Directory(path)
        }
    }
}

/// Decompile a target, validating it first.
pub fn decompile<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    target: &DecompileTarget,
    jobs: usize,
) -> PipelineResult<StageReport<PathBuf>> {
    match target {
        DecompileTarget::File(apk) => decompile_file(runner, tools, apk),
        DecompileTarget::Directory(dir) => decompile_dir(runner, tools, &WorkDir::new(dir), jobs),
    }
}

/// Decompile a single APK next to itself.
#[instrument(skip(runner, tools))]
pub fn decompile_file<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    apk: &Path,
) -> PipelineResult<StageReport<PathBuf>> {
    if !apk.exists() {
        return Err(PipelineError::invalid_input(apk, "APK file does not exist"));
    }
    let named_apk = apk
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_apk_name);
    if !named_apk || !apk.is_file() {
        return Err(PipelineError::invalid_input(apk, "not an APK file"));
    }
    Ok(StageReport {
        items: vec![decompile_one(runner, tools, apk)],
    })
}

/// Decompile every `*.apk` directly inside `dir` (non-recursive).
#[instrument(skip(runner, tools, dir), fields(dir = %dir.root().display()))]
pub fn decompile_dir<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    dir: &WorkDir,
    jobs: usize,
) -> PipelineResult<StageReport<PathBuf>> {
    let apks = dir.apk_files()?;
    if apks.is_empty() {
        info!("no APK files found");
        return Ok(StageReport::default());
    }
    info!(count = apks.len(), "found APK files to decompile");
    for apk in &apks {
        info!(apk = %apk.display(), "queued");
    }

    let items = map_bounded(&apks, jobs, |apk| decompile_one(runner, tools, apk));
    Ok(StageReport { items })
}

fn decompile_one<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    apk: &Path,
) -> ArtifactReport<PathBuf> {
    let file_name = apk
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = tree_name(&file_name).unwrap_or(&file_name).to_string();
    let output = apk.with_file_name(&name);

    let _span = info_span!("decompile", artifact = %name).entered();
    info!(apk = %apk.display(), output = %output.display(), "decompiling");
    let result = match runner.run(&tools.decompile(apk, &output)) {
        Ok(()) => {
            info!("decompiled");
            Ok(output)
        }
        Err(error) => {
            warn!(err = %error, "decompile failed");
            Err(ArtifactFailure {
                phase: Phase::Decompile,
                error,
            })
        }
    };

    ArtifactReport {
        name,
        input: apk.to_path_buf(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::PipelineConfig;
    use crate::test_support::{ScriptedRunner, TestWorkdir};

    fn tools() -> Toolchain {
        Toolchain::from_config(&PipelineConfig::default())
    }

    #[test]
    fn failure_is_isolated_to_one_apk() {
        let env = TestWorkdir::new().expect("workdir");
        env.write("a.apk", "a").expect("a");
        env.write("b.apk", "b").expect("b");
        let runner = ScriptedRunner::new().fail_decompile_of("a.apk");

        let report = decompile_dir(&runner, &tools(), env.workdir(), 1).expect("decompile");

        assert_eq!(report.failed_names(), vec!["a"]);
        let ok: Vec<&str> = report.succeeded().map(|i| i.name.as_str()).collect();
        assert_eq!(ok, vec!["b"]);
        assert!(env.path().join("b").is_dir());
        assert!(!env.path().join("a").exists());
    }

    #[test]
    fn parallel_run_keeps_input_order_and_isolation() {
        let env = TestWorkdir::new().expect("workdir");
        for name in ["a.apk", "b.apk", "c.apk", "d.apk"] {
            env.write(name, name).expect("seed");
        }
        let runner = ScriptedRunner::new().fail_decompile_of("c.apk");

        let report = decompile_dir(&runner, &tools(), env.workdir(), 3).expect("decompile");

        let names: Vec<&str> = report.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(report.failed_names(), vec!["c"]);
    }

    #[test]
    fn rerun_targets_same_tree_with_overwrite() {
        let env = TestWorkdir::new().expect("workdir");
        env.write("base.apk", "base").expect("seed");
        let runner = ScriptedRunner::new();

        decompile_dir(&runner, &tools(), env.workdir(), 1).expect("first");
        decompile_dir(&runner, &tools(), env.workdir(), 1).expect("second");

        let calls = runner.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
        assert_eq!(calls[0].argv.last().map(String::as_str), Some("-f"));
        assert_eq!(env.names().expect("names"), vec!["base", "base.apk"]);
    }

    #[test]
    fn empty_directory_reports_nothing() {
        let env = TestWorkdir::new().expect("workdir");
        env.write("readme.txt", "").expect("seed");
        let runner = ScriptedRunner::new();
        let report = decompile_dir(&runner, &tools(), env.workdir(), 1).expect("decompile");
        assert!(report.is_empty());
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn missing_directory_fails() {
        let env = TestWorkdir::new().expect("workdir");
        let runner = ScriptedRunner::new();
        let target = DecompileTarget::resolve(env.path().join("absent"));
        let err = decompile(&runner, &tools(), &target, 1).expect_err("missing");
        assert!(matches!(err, PipelineError::DirectoryNotFound { .. }));
    }

    #[test]
    fn non_apk_file_is_rejected_without_tools() {
        let env = TestWorkdir::new().expect("workdir");
        env.write("notes.txt", "").expect("seed");
        let runner = ScriptedRunner::new();

        let err = decompile_file(&runner, &tools(), &env.path().join("notes.txt"))
            .expect_err("invalid");
        assert!(matches!(err, PipelineError::InvalidInput { .. }));

        let err = decompile_file(&runner, &tools(), &env.path().join("gone.apk"))
            .expect_err("missing");
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
        assert!(runner.invocations().is_empty());

        assert_eq!(
            DecompileTarget::resolve(env.path().join("notes.txt")),
            DecompileTarget::File(env.path().join("notes.txt"))
        );
        assert_eq!(
            DecompileTarget::resolve(env.path().join("gone.apk")),
            DecompileTarget::File(env.path().join("gone.apk"))
        );
    }

    #[test]
    fn single_file_target_decompiles_next_to_apk() {
        let env = TestWorkdir::new().expect("workdir");
        env.write("app.apk", "app").expect("seed");
        let runner = ScriptedRunner::new();

        let target = DecompileTarget::resolve(env.path().join("app.apk"));
        assert_eq!(target, DecompileTarget::File(env.path().join("app.apk")));
        let report = decompile(&runner, &tools(), &target, 1).expect("decompile");

        assert_eq!(report.items.len(), 1);
        assert_eq!(
            report.items[0].result.as_ref().ok(),
            Some(&env.path().join("app"))
        );
    }
}
