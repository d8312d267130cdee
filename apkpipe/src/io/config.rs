//! Tool configuration stored in `apkpipe.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "apkpipe.toml";

/// Pipeline configuration (TOML).
///
/// Resolved once at startup and passed explicitly to every stage. Each tool is
/// an argv prefix; the stage appends its own arguments. Missing fields default
/// to the usual jar locations in the current directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Device bridge, e.g. `["adb"]`.
    pub adb: Vec<String>,

    /// Decompiler (apktool). Receives `d <apk> -o <dir> -f` or `b <dir> -o <apk>`.
    pub decompiler: Vec<String>,

    /// Signer (uber-apk-signer). Receives `-a <apk>`.
    pub signer: Vec<String>,

    /// Bundler (bundletool). Receives `build-apks --mode=universal ...`.
    pub bundler: Vec<String>,

    /// Per-invocation timeout in seconds. `0` disables the timeout.
    pub timeout_secs: u64,

    /// Artifacts processed concurrently by decompile and build.
    pub jobs: usize,

    /// Bound on captured tool output kept in memory per stream.
    pub output_limit_bytes: usize,

    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Target a specific device (`adb -s <serial>`). Unset uses adb's default.
    pub serial: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            adb: argv(&["adb"]),
            decompiler: argv(&["java", "-jar", "apktool_2.12.0.jar"]),
            signer: argv(&["java", "-jar", "uber-apk-signer.jar"]),
            bundler: argv(&["java", "-jar", "bundletool-all-1.18.1.jar"]),
            timeout_secs: 0,
            jobs: 1,
            output_limit_bytes: 1_000_000,
            device: DeviceConfig::default(),
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub serial: Option<String>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        for (key, command) in [
            ("adb", &self.adb),
            ("decompiler", &self.decompiler),
            ("signer", &self.signer),
            ("bundler", &self.bundler),
        ] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(anyhow!("{key} must be a non-empty array"));
            }
        }
        if self.jobs == 0 {
            return Err(anyhow!("jobs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if let Some(serial) = &self.device.serial
            && serial.trim().is_empty()
        {
            return Err(anyhow!("device.serial must not be empty when set"));
        }
        Ok(())
    }

    /// Timeout applied to each tool invocation, if any.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Apply command-line overrides and re-validate.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(serial) = &overrides.serial {
            self.device.serial = Some(serial.clone());
        }
        if let Some(jobs) = overrides.jobs {
            self.jobs = jobs;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
