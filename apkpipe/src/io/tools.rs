//! Command construction for the external tools.
//!
//! [`Toolchain`] turns configured argv prefixes into concrete [`Invocation`]s.
//! Each invocation also carries a [`ToolAction`] describing what it does, which
//! the system runner only uses for labels but scripted runners use to emulate
//! the tool.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::io::config::PipelineConfig;

/// What an invocation asks a tool to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAction {
    ListPackages,
    ResolvePaths { package: String },
    Pull { remote: String, local: PathBuf },
    InstallMultiple { apks: Vec<PathBuf> },
    Decompile { apk: PathBuf, output: PathBuf },
    Build { tree: PathBuf, output: PathBuf },
    Sign { apk: PathBuf },
    BuildUniversal { bundle: PathBuf, output: PathBuf },
}

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub action: ToolAction,
    /// Program followed by its arguments; never empty.
    pub argv: Vec<String>,
    label: String,
}

impl Invocation {
    fn new(action: ToolAction, argv: Vec<String>, label: impl Into<String>) -> Self {
        Self {
            action,
            argv,
            label: label.into(),
        }
    }

    /// Short name used to attribute log lines and tool output.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Command line as shown to the operator, with arguments quoted when needed.
    pub fn command_line(&self) -> String {
        self.argv
            .iter()
            .map(|arg| quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(self.argv.first().map(String::as_str).unwrap_or_default());
        cmd.args(self.args());
        cmd
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+,@~".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Builds invocations for the device bridge, decompiler, signer and bundler.
#[derive(Debug, Clone)]
pub struct Toolchain {
    adb: Vec<String>,
    decompiler: Vec<String>,
    signer: Vec<String>,
    bundler: Vec<String>,
}

impl Toolchain {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut adb = config.adb.clone();
        if let Some(serial) = &config.device.serial {
            adb.push("-s".to_string());
            adb.push(serial.clone());
        }
        Self {
            adb,
            decompiler: config.decompiler.clone(),
            signer: config.signer.clone(),
            bundler: config.bundler.clone(),
        }
    }

    pub fn list_packages(&self) -> Invocation {
        let argv = with_args(&self.adb, ["shell", "pm", "list", "packages"]);
        Invocation::new(ToolAction::ListPackages, argv, "pm list")
    }

    pub fn resolve_paths(&self, package: &str) -> Invocation {
        let argv = with_args(&self.adb, ["shell", "pm", "path", package]);
        Invocation::new(
            ToolAction::ResolvePaths {
                package: package.to_string(),
            },
            argv,
            package,
        )
    }

    pub fn pull(&self, remote: &str, local: &Path) -> Invocation {
        let argv = with_args(&self.adb, ["pull", remote, path_arg(local).as_str()]);
        Invocation::new(
            ToolAction::Pull {
                remote: remote.to_string(),
                local: local.to_path_buf(),
            },
            argv,
            file_label(local),
        )
    }

    /// One `install-multiple -r` call for the whole split set.
    pub fn install_multiple(&self, apks: &[PathBuf]) -> Invocation {
        let mut argv = with_args(&self.adb, ["install-multiple", "-r"]);
        argv.extend(apks.iter().map(|apk| path_arg(apk)));
        Invocation::new(
            ToolAction::InstallMultiple {
                apks: apks.to_vec(),
            },
            argv,
            "install",
        )
    }

    /// Decode `apk` into `output`, overwriting a previous decode.
    pub fn decompile(&self, apk: &Path, output: &Path) -> Invocation {
        let argv = with_args(
            &self.decompiler,
            ["d", path_arg(apk).as_str(), "-o", path_arg(output).as_str(), "-f"],
        );
        Invocation::new(
            ToolAction::Decompile {
                apk: apk.to_path_buf(),
                output: output.to_path_buf(),
            },
            argv,
            file_label(output),
        )
    }

    pub fn build(&self, tree: &Path, output: &Path) -> Invocation {
        let argv = with_args(
            &self.decompiler,
            ["b", path_arg(tree).as_str(), "-o", path_arg(output).as_str()],
        );
        Invocation::new(
            ToolAction::Build {
                tree: tree.to_path_buf(),
                output: output.to_path_buf(),
            },
            argv,
            file_label(tree),
        )
    }

    pub fn sign(&self, apk: &Path) -> Invocation {
        let argv = with_args(&self.signer, ["-a", path_arg(apk).as_str()]);
        Invocation::new(
            ToolAction::Sign {
                apk: apk.to_path_buf(),
            },
            argv,
            file_label(apk),
        )
    }

    pub fn build_universal(&self, bundle: &Path, output: &Path) -> Invocation {
        let argv = with_args(
            &self.bundler,
            [
                "build-apks",
                "--mode=universal",
                "--bundle",
                path_arg(bundle).as_str(),
                "--output",
                path_arg(output).as_str(),
                "--overwrite",
            ],
        );
        Invocation::new(
            ToolAction::BuildUniversal {
                bundle: bundle.to_path_buf(),
                output: output.to_path_buf(),
            },
            argv,
            file_label(bundle),
        )
    }
}

fn with_args<'a>(prefix: &[String], args: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut argv = prefix.to_vec();
    argv.extend(args.into_iter().map(str::to_string));
    argv
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_arg(path))
}
