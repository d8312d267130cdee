//! Test-only helpers: a scripted tool runner and scratch working directories.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::naming::signed_name;
use crate::error::{PipelineError, PipelineResult};
use crate::io::process::ToolRunner;
use crate::io::tools::{Invocation, ToolAction};
use crate::io::workdir::WorkDir;

type FailRule = Box<dyn Fn(&ToolAction) -> bool + Send + Sync>;

/// Runner that records every invocation and emulates the tools on disk.
///
/// Successful invocations leave the files the real tool would: pulls write
/// the local APK, decompiles create the tree, builds write the unsigned APK,
/// the signer writes its `-aligned-debugSigned.apk` copy. Rules registered
/// with [`ScriptedRunner::fail_when`] make matching invocations exit 1
/// without side effects.
#[derive(Default)]
pub struct ScriptedRunner {
    packages: Vec<String>,
    apk_paths: HashMap<String, Vec<String>>,
    fail_rules: Vec<FailRule>,
    signer_writes_nothing: bool,
    log: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packages reported by `pm list packages`.
    pub fn with_packages(mut self, packages: &[&str]) -> Self {
        self.packages = packages.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Paths reported by `pm path <package>`.
    pub fn with_apk_paths(mut self, package: &str, paths: &[&str]) -> Self {
        self.apk_paths.insert(
            package.to_string(),
            paths.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn fail_when(mut self, rule: impl Fn(&ToolAction) -> bool + Send + Sync + 'static) -> Self {
        self.fail_rules.push(Box::new(rule));
        self
    }

    /// Fail the decompile of the APK with this file name.
    pub fn fail_decompile_of(self, apk_name: &str) -> Self {
        let apk_name = apk_name.to_string();
        self.fail_when(move |action| {
            matches!(action, ToolAction::Decompile { apk, .. } if file_name(apk) == apk_name)
        })
    }

    /// Fail the rebuild of the tree with this directory name.
    pub fn fail_build_of(self, tree_name: &str) -> Self {
        let tree_name = tree_name.to_string();
        self.fail_when(move |action| {
            matches!(action, ToolAction::Build { tree, .. } if file_name(tree) == tree_name)
        })
    }

    /// Fail the pull of this remote path.
    pub fn fail_pull_of(self, remote_path: &str) -> Self {
        let remote_path = remote_path.to_string();
        self.fail_when(move |action| {
            matches!(action, ToolAction::Pull { remote, .. } if *remote == remote_path)
        })
    }

    /// Signer exits 0 but leaves no signed file behind.
    pub fn with_silent_signer(mut self) -> Self {
        self.signer_writes_nothing = true;
        self
    }

    /// Every invocation seen so far, in call order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<ToolAction> {
        self.invocations().into_iter().map(|inv| inv.action).collect()
    }

    fn record(&self, invocation: &Invocation) -> PipelineResult<()> {
        if let Ok(mut log) = self.log.lock() {
            log.push(invocation.clone());
        }
        if self.fail_rules.iter().any(|rule| rule(&invocation.action)) {
            return Err(PipelineError::CommandFailed {
                command: invocation.command_line(),
                exit_code: Some(1),
            });
        }
        Ok(())
    }

    fn emulate(&self, action: &ToolAction) -> std::io::Result<()> {
        match action {
            ToolAction::Pull { remote, local } => fs::write(local, remote.as_bytes()),
            ToolAction::Decompile { apk, output } => {
                fs::create_dir_all(output)?;
                fs::write(
                    output.join("apktool.yml"),
                    format!("apkFileName: {}\n", file_name(apk)),
                )
            }
            ToolAction::Build { tree, output } => {
                fs::write(output, format!("built from {}\n", file_name(tree)))
            }
            ToolAction::Sign { apk } => {
                if self.signer_writes_nothing {
                    return Ok(());
                }
                let signed = apk.with_file_name(signed_name(&file_name(apk)));
                fs::copy(apk, signed).map(|_| ())
            }
            ToolAction::BuildUniversal { output, .. } => fs::write(output, b"apk set\n"),
            ToolAction::ListPackages
            | ToolAction::ResolvePaths { .. }
            | ToolAction::InstallMultiple { .. } => Ok(()),
        }
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> PipelineResult<()> {
        self.record(invocation)?;
        self.emulate(&invocation.action)
            .map_err(|e| PipelineError::io(format!("emulate {}", invocation.command_line()), e))
    }

    fn capture(&self, invocation: &Invocation) -> PipelineResult<String> {
        self.record(invocation)?;
        let lines: &[String] = match &invocation.action {
            ToolAction::ListPackages => &self.packages,
            ToolAction::ResolvePaths { package } => {
                self.apk_paths.get(package).map(Vec::as_slice).unwrap_or_default()
            }
            _ => &[],
        };
        Ok(lines
            .iter()
            .map(|line| format!("package:{line}\r\n"))
            .collect())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Scratch working directory removed on drop.
pub struct TestWorkdir {
    _temp: TempDir,
    workdir: WorkDir,
}

impl TestWorkdir {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let workdir = WorkDir::new(temp.path().join("workdir"));
        fs::create_dir_all(workdir.root()).context("create workdir")?;
        Ok(Self {
            _temp: temp,
            workdir,
        })
    }

    pub fn workdir(&self) -> &WorkDir {
        &self.workdir
    }

    pub fn path(&self) -> &Path {
        self.workdir.root()
    }

    /// Create an empty file (or overwrite with `contents`).
    pub fn write(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.workdir.join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn mkdir(&self, name: &str) -> Result<()> {
        let path = self.workdir.join(name);
        fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))
    }

    /// Sorted names of the direct children.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.path()).context("read workdir")? {
            names.push(entry.context("read entry")?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
