//! livepy - re-run only what an edit affects.

use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;

use livepy::config::{Cli, Config, display_path};
use livepy::driver::{CycleOutcome, Driver};
use livepy::interpreter::Interpreter;
use livepy::run_state::FileSink;
use livepy::watch::{ChangeEvent, FileWatcher};

fn main() -> Result<ExitCode> {
    init_tracing();

    let config = Config::from_cli(Cli::parse())?;
    config.apply_color();
    config.prepare_run_state_dir()?;

    let sink = FileSink::new(&config.run_state, config.format);
    let mut driver = Driver::new(Interpreter::new(), sink);

    if config.once {
        let source = fs::read_to_string(&config.file)
            .with_context(|| format!("reading {}", config.file.display()))?;
        let event = ChangeEvent::new(&config.file, source);
        let outcome = driver.on_change(&event);
        report(&event, &outcome);
        let succeeded = matches!(
            outcome,
            CycleOutcome::Committed { .. } | CycleOutcome::NothingToRun
        );
        return Ok(if succeeded {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let watcher = FileWatcher::new(&config.file, config.poll_interval)
        .with_context(|| format!("watching {}", config.file.display()))?;
    eprintln!(
        "{} {} {}",
        "watching".dimmed(),
        display_path(&config.file).cyan(),
        format!("(run state: {})", config.run_state.display()).dimmed()
    );
    driver.run(watcher, report);
    Ok(ExitCode::SUCCESS)
}

/// Logging is off unless asked for; `RUST_LOG` overrides the default
/// `livepy=warn` filter.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("livepy=warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn report(event: &ChangeEvent, outcome: &CycleOutcome) {
    let path = display_path(&event.path);
    match outcome {
        CycleOutcome::ParseFailed(error) => {
            eprintln!("{}{}{}", "[".dimmed(), path.cyan(), "]".dimmed());
            eprintln!("{} {} {}", "→".red(), "SyntaxError:".red().bold(), error);
        }
        CycleOutcome::Aborted(fault) => {
            eprintln!(
                "{}{}:{}{}",
                "[".dimmed(),
                path.cyan(),
                fault.origin,
                "]".dimmed()
            );
            if fault.origin != fault.lines.start {
                eprintln!(
                    "  {}",
                    format!("called from line {}", fault.lines.start).dimmed()
                );
            }
            eprintln!(
                "{} {} {}",
                "→".red(),
                format!("{}:", fault.error.class_name()).red().bold(),
                fault.error.message()
            );
        }
        CycleOutcome::NothingToRun | CycleOutcome::Committed { .. } => {}
    }
    let summary = match outcome {
        CycleOutcome::ParseFailed(_) => "not run".to_string(),
        CycleOutcome::NothingToRun => "up to date".to_string(),
        CycleOutcome::Committed { executed: 1 } => "ran 1 statement".to_string(),
        CycleOutcome::Committed { executed } => format!("ran {executed} statements"),
        CycleOutcome::Aborted(_) => "stopped".to_string(),
    };
    eprintln!("{}", format!("-- {summary}; waiting for changes --").dimmed());
}
