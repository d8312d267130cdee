//! Stage dispatch: resolve a working directory, run one stage, render it.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::build::build_and_sign;
use crate::decompile::{DecompileTarget, decompile};
use crate::error::PipelineResult;
use crate::install::install_signed;
use crate::io::device::Device;
use crate::io::process::ToolRunner;
use crate::io::tools::Toolchain;
use crate::io::workdir::WorkDir;
use crate::pull::pull_package;
use crate::report::{self, Rendered};
use crate::universal::{UniversalRequest, build_universal};

/// Working directory used when `--dir` is not given.
pub const DEFAULT_WORKDIR: &str = "workdir";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    List { filter: Option<String> },
    Pull { package: String, workdir: PathBuf },
    Decompile { target: PathBuf },
    Build { workdir: PathBuf },
    Install { workdir: PathBuf },
    Universal { workdir: PathBuf, request: UniversalRequest },
    Status { workdir: PathBuf },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Pull { .. } => "pull",
            Self::Decompile { .. } => "decompile",
            Self::Build { .. } => "build",
            Self::Install { .. } => "install",
            Self::Universal { .. } => "universal",
            Self::Status { .. } => "status",
        }
    }
}

/// `--dir`, or [`DEFAULT_WORKDIR`].
pub fn stage_workdir(dir: Option<&Path>) -> PathBuf {
    dir.map_or_else(|| PathBuf::from(DEFAULT_WORKDIR), Path::to_path_buf)
}

/// Pull writes into `--dir` when given, else a directory named after the package.
pub fn pull_workdir(dir: Option<&Path>, package: &str) -> PathBuf {
    dir.map_or_else(|| PathBuf::from(package), Path::to_path_buf)
}

/// Decompile targets the positional path when given, else the working directory.
pub fn decompile_target(path: Option<&Path>, dir: Option<&Path>) -> PathBuf {
    path.map_or_else(|| stage_workdir(dir), Path::to_path_buf)
}

/// Run one stage to completion. Failures are rendered, never propagated.
pub fn run_stage<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    jobs: usize,
    stage: &Stage,
) -> Rendered {
    let name = stage.name();
    info!(stage = name, "starting");
    match dispatch(runner, tools, jobs, stage) {
        Ok(rendered) => rendered,
        Err(err) => {
            error!(stage = name, err = %err, "stage failed");
            report::failure(name, &err)
        }
    }
}

fn dispatch<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    jobs: usize,
    stage: &Stage,
) -> PipelineResult<Rendered> {
    match stage {
        Stage::List { filter } => {
            let packages = Device::new(runner, tools).list_packages(filter.as_deref())?;
            Ok(report::packages(&packages))
        }
        Stage::Pull { package, workdir } => {
            let outcome = pull_package(runner, tools, package, &WorkDir::new(workdir))?;
            Ok(report::pull(&outcome))
        }
        Stage::Decompile { target } => {
            let target = DecompileTarget::resolve(target);
            let report = decompile(runner, tools, &target, jobs)?;
            let empty = match &target {
                DecompileTarget::Directory(dir) => {
                    format!("No APK files found in directory: {}", dir.display())
                }
                DecompileTarget::File(apk) => format!("Nothing decompiled: {}", apk.display()),
            };
            Ok(report::artifacts("decompile", &empty, &report))
        }
        Stage::Build { workdir } => {
            let report = build_and_sign(runner, tools, &WorkDir::new(workdir), jobs)?;
            let empty = format!("No decompiled APK folders found in: {}", workdir.display());
            Ok(report::artifacts("build", &empty, &report))
        }
        Stage::Install { workdir } => {
            let outcome = install_signed(runner, tools, &WorkDir::new(workdir))?;
            Ok(report::install(&outcome))
        }
        Stage::Universal { workdir, request } => {
            let outcome = build_universal(runner, tools, &WorkDir::new(workdir), request)?;
            Ok(report::universal(&outcome))
        }
        Stage::Status { workdir } => {
            let workdir = WorkDir::new(workdir);
            let summary = workdir.summary()?;
            Ok(report::status(workdir.root(), &summary))
        }
    }
}
