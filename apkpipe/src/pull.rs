//! Pull stage: copy every APK of an installed package into the working directory.
//!
//! Pulls run in device order. A failure aborts the remaining pulls, since a
//! partial split set is rarely useful on its own; the error lists what was
//! already pulled.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use crate::core::naming::{allocate_local_name, remote_basename};
use crate::core::packages::is_valid_package_id;
use crate::error::{PipelineError, PipelineResult};
use crate::io::device::{ApkPaths, Device};
use crate::io::process::ToolRunner;
use crate::io::tools::Toolchain;
use crate::io::workdir::WorkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulledArtifact {
    pub remote: String,
    pub local: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// The package has no APK paths on the device. Reported, not fatal.
    NoApks { package: String },
    /// Every path was pulled, in device order.
    Pulled(Vec<PulledArtifact>),
}

#[instrument(skip(runner, tools, workdir), fields(workdir = %workdir.root().display()))]
pub fn pull_package<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    package: &str,
    workdir: &WorkDir,
) -> PipelineResult<PullOutcome> {
    if !is_valid_package_id(package) {
        return Err(PipelineError::invalid_input(
            package,
            "not a valid package identifier",
        ));
    }

    workdir.ensure_created()?;
    let device = Device::new(runner, tools);
    let paths = match device.resolve_apk_paths(package)? {
        ApkPaths::None => {
            info!("no APKs found for package");
            return Ok(PullOutcome::NoApks {
                package: package.to_string(),
            });
        }
        ApkPaths::Found(paths) => paths,
    };

    info!(count = paths.len(), "found APKs");
    for path in &paths {
        info!(path = %path, "apk");
    }

    let mut taken = workdir.taken_names()?;
    let mut pulled: Vec<PulledArtifact> = Vec::with_capacity(paths.len());
    for (index, remote) in paths.iter().enumerate() {
        let basename = remote_basename(remote);
        if basename.is_empty() {
            return Err(abort(
                remote,
                &pulled,
                PipelineError::invalid_input(remote, "device path has no file name"),
            ));
        }
        let local_name = allocate_local_name(basename, index, |name| taken.contains(name));
        taken.insert(local_name.clone());
        let local = workdir.join(&local_name);

        if let Err(err) = device.pull(remote, &local) {
            warn!(remote = %remote, pulled = pulled.len(), "pull failed, aborting");
            return Err(abort(remote, &pulled, err));
        }
        info!(remote = %remote, local = %local.display(), "pulled");
        pulled.push(PulledArtifact {
            remote: remote.clone(),
            local,
        });
    }

    Ok(PullOutcome::Pulled(pulled))
}

fn abort(remote: &str, pulled: &[PulledArtifact], source: PipelineError) -> PipelineError {
    PipelineError::PullAborted {
        failed_remote: remote.to_string(),
        pulled: pulled.iter().map(|a| a.local.clone()).collect(),
        source: Box::new(source),
    }
}
