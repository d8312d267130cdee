//! Install stage: push the signed split set to the device in one call.

use std::path::PathBuf;

use tracing::{info, instrument};

use crate::error::PipelineResult;
use crate::io::device::Device;
use crate::io::process::ToolRunner;
use crate::io::tools::Toolchain;
use crate::io::workdir::WorkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Nothing ends in `-aligned-debugSigned.apk`. Reported, not fatal.
    NoSignedApks,
    /// APKs passed to `install-multiple`, in the order given.
    Installed { apks: Vec<PathBuf> },
}

/// Install every signed APK in lexicographic order with a single
/// `install-multiple -r`; the device rejects partial split sets.
#[instrument(skip(runner, tools, workdir), fields(workdir = %workdir.root().display()))]
pub fn install_signed<R: ToolRunner>(
    runner: &R,
    tools: &Toolchain,
    workdir: &WorkDir,
) -> PipelineResult<InstallOutcome> {
    let apks = workdir.signed_apks()?;
    if apks.is_empty() {
        info!("no signed APKs found");
        return Ok(InstallOutcome::NoSignedApks);
    }
    info!(count = apks.len(), "installing APKs");
    for apk in &apks {
        info!(apk = %apk.display(), "install");
    }

    Device::new(runner, tools).install_multiple(&apks)?;
    Ok(InstallOutcome::Installed { apks })
}
