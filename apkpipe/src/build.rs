//! Build+Sign stage: rebuild each decompiled tree and sign the result.
//!
//! Trees are independent. A build or sign failure is recorded for that tree
//! and the others are still processed. Within one tree the order is strict:
//! the signer only runs on an APK that was just built successfully.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, info_span, instrument, warn};

use crate::batch::map_bounded;
use crate::core::naming::{signed_name, unsigned_name};
use crate::core::types::{ArtifactFailure, ArtifactReport, Phase, SignedOutput, StageReport};
use crate::error::PipelineError;
use crate::error::PipelineResult;
use crate::io::process::ToolRunner;
use crate::io::tools::Toolchain;
use crate::io::workdir::{Entry, WorkDir};

#[instrument(skip(runner, tools, workdir), fields(workdir = %workdir.root().display()))]
pub fn build_and_sign<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    workdir: &WorkDir,
    jobs: usize,
) -> PipelineResult<StageReport<SignedOutput>> {
    let trees = workdir.trees()?;
    if trees.is_empty() {
        info!("no decompiled APK folders found");
        return Ok(StageReport::default());
    }
    info!(count = trees.len(), "found folders to build");
    for tree in &trees {
        info!(tree = %tree.name, "queued");
    }

    let items = map_bounded(&trees, jobs, |tree| build_one(runner, tools, workdir, tree));
    Ok(StageReport { items })
}

fn build_one<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    workdir: &WorkDir,
    tree: &Entry,
) -> ArtifactReport<SignedOutput> {
    let _span = info_span!("build", artifact = %tree.name).entered();
    let result = build_then_sign(runner, tools, workdir, tree);
    match &result {
        Ok(output) => info!(signed = %output.signed.display(), "built and signed"),
        Err(failure) => warn!(phase = ?failure.phase, err = %failure.error, "build/sign failed"),
    }
    ArtifactReport {
        name: tree.name.clone(),
        input: tree.path.clone(),
        result,
    }
}

fn build_then_sign<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    workdir: &WorkDir,
    tree: &Entry,
) -> Result<SignedOutput, ArtifactFailure> {
    let unsigned_file = unsigned_name(&tree.name);
    let unsigned = workdir.join(&unsigned_file);
    let signed = workdir.join(&signed_name(&unsigned_file));

    runner
        .run(&tools.build(&tree.path, &unsigned))
        .map_err(|error| ArtifactFailure {
            phase: Phase::Build,
            error,
        })?;
    remove_stale(&signed).map_err(|error| ArtifactFailure {
        phase: Phase::Sign,
        error,
    })?;
    runner
        .run(&tools.sign(&unsigned))
        .map_err(|error| ArtifactFailure {
            phase: Phase::Sign,
            error,
        })?;

    if !signed.is_file() {
        return Err(ArtifactFailure {
            phase: Phase::Sign,
            error: PipelineError::SignedArtifactMissing { expected: signed },
        });
    }
    Ok(SignedOutput { unsigned, signed })
}

/// Delete a signed APK left by an earlier run so only fresh signer output counts.
fn remove_stale(signed: &Path) -> PipelineResult<()> {
    match fs::remove_file(signed) {
        Ok(()) => {
            debug!(path = %signed.display(), "removed previous signed APK");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io(
            format!("remove previous {}", signed.display()),
            e,
        )),
    }
}
