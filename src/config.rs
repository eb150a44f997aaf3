//! Command-line interface and the validated configuration built from it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ColorChoice, Parser};

use crate::run_state::RunStateFormat;

pub const DEFAULT_RUN_STATE_PATH: &str = "~/.livepy/runstate";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Watch a script and re-run only the statements an edit affects
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script to watch
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// File the per-line run state is written to
    #[arg(long, default_value = DEFAULT_RUN_STATE_PATH, value_hint = clap::ValueHint::FilePath)]
    pub run_state: String,

    /// Run-state file format
    #[arg(long, value_enum, default_value_t = RunStateFormat::Names)]
    pub format: RunStateFormat,

    /// How often the script is polled for changes, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Run the current contents once and exit instead of watching
    #[arg(long)]
    pub once: bool,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub file: PathBuf,
    pub run_state: PathBuf,
    pub format: RunStateFormat,
    pub poll_interval: Duration,
    pub once: bool,
    pub color: ColorChoice,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if !cli.file.is_file() {
            bail!("script '{}' does not exist or is not a file", cli.file.display());
        }
        if cli.poll_interval_ms == 0 {
            bail!("--poll-interval-ms must be greater than zero");
        }
        let run_state = expand_path(&cli.run_state);
        if run_state.as_os_str().is_empty() {
            bail!("--run-state must not be empty");
        }

        Ok(Self {
            file: cli.file,
            run_state,
            format: cli.format,
            poll_interval: Duration::from_millis(cli.poll_interval_ms),
            once: cli.once,
            color: cli.color,
        })
    }

    /// Set the global color override based on `--color`.
    pub fn apply_color(&self) {
        match self.color {
            ColorChoice::Always => owo_colors::set_override(true),
            ColorChoice::Never => owo_colors::set_override(false),
            ColorChoice::Auto => {} // owo-colors auto-detects TTY
        }
    }

    /// Creates the directory the run-state file lives in.
    pub fn prepare_run_state_dir(&self) -> Result<()> {
        if let Some(parent) = self.run_state.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating run-state directory {}", parent.display()))?;
        }
        Ok(())
    }
}

/// Tilde-expands `path`.
fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Display form of `path` relative to the working directory when possible.
pub fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
