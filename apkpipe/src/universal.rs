//! Universal build: turn an app bundle into a single installable APK set.
//!
//! Independent of the other stages. With no explicit bundle the working
//! directory must hold exactly one `.aab`; several candidates are an error
//! rather than an arbitrary pick.

use std::path::PathBuf;

use tracing::{info, instrument};

use crate::core::naming::{BUNDLE_EXTENSION, UNIVERSAL_OUTPUT};
use crate::error::{PipelineError, PipelineResult};
use crate::io::process::ToolRunner;
use crate::io::tools::Toolchain;
use crate::io::workdir::WorkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniversalRequest {
    /// Bundle to convert. Defaults to the single `.aab` in the working directory.
    pub bundle: Option<PathBuf>,
    /// Output file. Defaults to `<workdir>/universal.apks`.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniversalOutcome {
    /// No `.aab` in the working directory. Reported, not fatal.
    NoBundle,
    Built { bundle: PathBuf, output: PathBuf },
}

#[instrument(skip(runner, tools, workdir), fields(workdir = %workdir.root().display()))]
pub fn build_universal<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    workdir: &WorkDir,
    request: &UniversalRequest,
) -> PipelineResult<UniversalOutcome> {
    workdir.require_exists()?;
    let Some(bundle) = select_bundle(workdir, request.bundle.as_ref())? else {
        info!("no AAB files found, universal build requires an app bundle");
        return Ok(UniversalOutcome::NoBundle);
    };
    let output = request
        .output
        .clone()
        .unwrap_or_else(|| workdir.join(UNIVERSAL_OUTPUT));

    info!(bundle = %bundle.display(), output = %output.display(), "creating universal APK set");
    runner.run(&tools.build_universal(&bundle, &output))?;
    Ok(UniversalOutcome::Built { bundle, output })
}

fn select_bundle(workdir: &WorkDir, explicit: Option<&PathBuf>) -> PipelineResult<Option<PathBuf>> {
    if let Some(bundle) = explicit {
        let named_bundle = bundle
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.len() > BUNDLE_EXTENSION.len() && n.ends_with(BUNDLE_EXTENSION));
        if !named_bundle || !bundle.is_file() {
            return Err(PipelineError::invalid_input(
                bundle.clone(),
                "not an existing .aab file",
            ));
        }
        return Ok(Some(bundle.clone()));
    }

    let mut candidates = workdir.bundles()?;
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => Err(PipelineError::AmbiguousBundle { candidates }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::PipelineConfig;
    use crate::io::tools::ToolAction;
    use crate::test_support::{ScriptedRunner, TestWorkdir};

    fn tools() -> Toolchain {
        Toolchain::from_config(&PipelineConfig::default())
    }

    #[test]
    fn single_bundle_is_converted() {
        let env = TestWorkdir::new().expect("workdir");
        env.write("app.aab", "bundle").expect("seed");
        let runner = ScriptedRunner::new();

        let outcome = build_universal(
            &runner,
            &tools(),
            env.workdir(),
            &UniversalRequest::default(),
        )
        .expect("universal");

        assert_eq!(
            outcome,
            UniversalOutcome::Built {
                bundle: env.path().join("app.aab"),
                output: env.path().join("universal.apks"),
            }
        );
        assert!(env.path().join("universal.apks").is_file());
    }

    #[test]
    fn several_bundles_require_explicit_choice() {
        let env = TestWorkdir::new().expect("workdir");
        env.write("a.aab", "").expect("seed");
        env.write("b.aab", "").expect("seed");
        let runner = ScriptedRunner::new();

        let err = build_universal(
            &runner,
            &tools(),
            env.workdir(),
            &UniversalRequest::default(),
        )
        .expect_err("ambiguous");
        match err {
            PipelineError::AmbiguousBundle { candidates } => assert_eq!(
                candidates,
                vec![env.path().join("a.aab"), env.path().join("b.aab")]
            ),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(runner.invocations().is_empty());

        let outcome = build_universal(
            &runner,
            &tools(),
            env.workdir(),
            &UniversalRequest {
                bundle: Some(env.path().join("b.aab")),
                output: Some(env.path().join("b.apks")),
            },
        )
        .expect("explicit");
        assert_eq!(
            runner.actions(),
            vec![ToolAction::BuildUniversal {
                bundle: env.path().join("b.aab"),
                output: env.path().join("b.apks"),
            }]
        );
        assert!(matches!(outcome, UniversalOutcome::Built { .. }));
    }

    #[test]
    fn no_bundle_is_reported() {
        let env = TestWorkdir::new().expect("workdir");
        let runner = ScriptedRunner::new();
        let outcome = build_universal(
            &runner,
            &tools(),
            env.workdir(),
            &UniversalRequest::default(),
        )
        .expect("universal");
        assert_eq!(outcome, UniversalOutcome::NoBundle);
    }

    #[test]
    fn explicit_non_bundle_is_invalid() {
        let env = TestWorkdir::new().expect("workdir");
        env.write("app.apk", "").expect("seed");
        let runner = ScriptedRunner::new();
        let err = build_universal(
            &runner,
            &tools(),
            env.workdir(),
            &UniversalRequest {
                bundle: Some(env.path().join("app.apk")),
                output: None,
            },
        )
        .expect_err("invalid");
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
    }
}
