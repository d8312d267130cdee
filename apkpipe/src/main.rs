//! Android app pipeline: pull, decompile, rebuild, sign and reinstall.
//!
//! Each subcommand runs one stage against a working directory. Stages are
//! independent invocations; the directory contents carry state between them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use apkpipe::driver::{self, Stage};
use apkpipe::exit_codes;
use apkpipe::io::config::{
    ConfigOverrides, DEFAULT_CONFIG_FILE, PipelineConfig, load_config, write_config,
};
use apkpipe::io::process::{RunnerOptions, SystemRunner};
use apkpipe::io::tools::Toolchain;
use apkpipe::logging;
use apkpipe::report::OutputFormat;
use apkpipe::universal::UniversalRequest;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "apkpipe",
    version,
    about = "Pull, decompile, rebuild, sign and reinstall Android apps"
)]
struct Cli {
    /// Working directory. Defaults to `workdir`, or the package name for pull.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Tool configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Device serial passed to adb as `-s`.
    #[arg(long, global = true)]
    serial: Option<String>,

    /// Artifacts processed concurrently by decompile and build.
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    /// Per-tool timeout in seconds, 0 for none.
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print the stage report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installed packages, optionally filtered by a case-insensitive substring.
    List { filter: Option<String> },
    /// Pull every APK of an installed package into the working directory.
    Pull { package: String },
    /// Decompile one APK, or every APK in a directory.
    Decompile { path: Option<PathBuf> },
    /// Rebuild every decompiled tree and sign the results.
    Build,
    /// Install all signed APKs in one `install-multiple` call.
    Install,
    /// Convert an app bundle into a universal APK set.
    Universal {
        /// Bundle to convert. Required when the directory holds several.
        #[arg(long)]
        bundle: Option<PathBuf>,
        /// Output file. Defaults to `<dir>/universal.apks`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show which artifacts exist and how far each APK has progressed.
    Status,
    /// Print the resolved configuration, or write it to the config file.
    Config {
        #[arg(long)]
        write: bool,
        /// Overwrite an existing config file.
        #[arg(short, long, requires = "write")]
        force: bool,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let Cli {
        dir,
        config: config_path,
        serial,
        jobs,
        timeout,
        json,
        command,
    } = cli;
    let overrides = ConfigOverrides {
        serial,
        jobs,
        timeout_secs: timeout,
    };
    let config = load_config(&config_path)?
        .with_overrides(&overrides)
        .context("apply command-line options")?;

    let dir = dir.as_deref();
    let stage = match command {
        Command::Config { write, force } => return cmd_config(&config_path, &config, write, force),
        Command::List { filter } => Stage::List { filter },
        Command::Pull { package } => Stage::Pull {
            workdir: driver::pull_workdir(dir, &package),
            package,
        },
        Command::Decompile { path } => Stage::Decompile {
            target: driver::decompile_target(path.as_deref(), dir),
        },
        Command::Build => Stage::Build {
            workdir: driver::stage_workdir(dir),
        },
        Command::Install => Stage::Install {
            workdir: driver::stage_workdir(dir),
        },
        Command::Universal { bundle, output } => Stage::Universal {
            workdir: driver::stage_workdir(dir),
            request: UniversalRequest { bundle, output },
        },
        Command::Status => Stage::Status {
            workdir: driver::stage_workdir(dir),
        },
    };

    let runner = SystemRunner::new(RunnerOptions {
        timeout: config.timeout(),
        output_limit_bytes: config.output_limit_bytes,
        attribute_output: config.jobs > 1,
        quiet_stdout: json,
    });
    let tools = Toolchain::from_config(&config);
    let rendered = driver::run_stage(&runner, &tools, config.jobs, &stage);
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    rendered.emit(format);
    Ok(rendered.exit_code)
}

fn cmd_config(path: &Path, config: &PipelineConfig, write: bool, force: bool) -> Result<i32> {
    if !write {
        let text = toml::to_string_pretty(config).context("serialize config toml")?;
        print!("{text}");
        return Ok(exit_codes::OK);
    }
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, config)?;
    info!(path = %path.display(), "config written");
    println!("{}", path.display());
    Ok(exit_codes::OK)
}
