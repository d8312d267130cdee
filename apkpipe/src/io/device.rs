//! Device adapter: package discovery, file transfer and installation over adb.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::core::packages::{filter_packages, parse_package_lines};
use crate::error::PipelineResult;
use crate::io::process::ToolRunner;
use crate::io::tools::Toolchain;

/// APK paths a package owns on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApkPaths {
    /// The package manager reported no paths.
    None,
    /// Base APK and splits, in device order.
    Found(Vec<String>),
}

/// Connected device, reached through the configured bridge command.
pub struct Device<'a, R: ToolRunner> {
    runner: &'a R,
    tools: &'a Toolchain,
}

impl<'a, R: ToolRunner> Device<'a, R> {
    pub fn new(runner: &'a R, tools: &'a Toolchain) -> Self {
        Self { runner, tools }
    }

    /// Installed package ids, optionally narrowed by a case-insensitive substring.
    #[instrument(skip(self))]
    pub fn list_packages(&self, filter: Option<&str>) -> PipelineResult<Vec<String>> {
        let out = self.runner.capture(&self.tools.list_packages())?;
        let packages = filter_packages(parse_package_lines(&out), filter);
        debug!(count = packages.len(), "packages listed");
        Ok(packages)
    }

    #[instrument(skip(self))]
    pub fn resolve_apk_paths(&self, package: &str) -> PipelineResult<ApkPaths> {
        let out = self.runner.capture(&self.tools.resolve_paths(package))?;
        let paths = parse_package_lines(&out);
        debug!(count = paths.len(), "apk paths resolved");
        if paths.is_empty() {
            return Ok(ApkPaths::None);
        }
        Ok(ApkPaths::Found(paths))
    }

    pub fn pull(&self, remote: &str, local: &Path) -> PipelineResult<()> {
        self.runner.run(&self.tools.pull(remote, local))
    }

    /// Install a split set atomically: one call with every APK.
    pub fn install_multiple(&self, apks: &[PathBuf]) -> PipelineResult<()> {
        self.runner.run(&self.tools.install_multiple(apks))
    }
}
