mod builtins;
mod config;
mod editor;
mod error;
mod executor;
mod history;
mod job_control;
mod jobs;
mod parser;
mod reaper;
mod redirect;
mod shell;
mod status;
mod suggest;

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use crossterm::tty::IsTty;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::{Config, Invocation};
use crate::history::History;
use crate::job_control::SigchldBlock;
use crate::shell::Shell;

const WELCOME: &str = "Welcome to forksh! Type 'exit' or '$Q' to quit.";

fn main() {
    let (debug, config_path) = match config::parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Run { debug, config }) => (debug, config),
        Ok(Invocation::Help) => {
            print_help();
            return;
        }
        Ok(Invocation::Version) => {
            println!("forksh {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };

    match run(debug, config_path.as_deref()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("forksh: fatal: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(debug: bool, config_path: Option<&Path>) -> Result<i32> {
    let log_filter = init_tracing(debug);

    let config = Config::load(config_path)?;
    if config.debug && !debug {
        log_filter
            .modify(|filter| *filter = log_filter_for(true))
            .context("cannot enable debug logging")?;
    }

    job_control::ignore_job_control_signals().context("cannot ignore job-control signals")?;
    {
        // The Ctrl-C thread inherits this mask, so SIGCHLD only ever lands on
        // the main thread.
        let _block = SigchldBlock::new().context("cannot block SIGCHLD")?;
        ctrlc::set_handler(|| {
            println!();
            let _ = io::stdout().flush();
        })
        .context("cannot install Ctrl-C handler")?;
    }
    reaper::install().context("cannot install SIGCHLD handler")?;

    let history = History::load(config.history_file.clone(), config.history_size);
    if config.welcome && io::stdin().is_tty() {
        println!("{WELCOME}");
    }

    let mut shell = Shell::new(config, history);
    Ok(shell.run())
}

fn log_filter_for(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("forksh=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Log to stderr. The returned handle lets the config file turn on debug
/// output after the subscriber is already installed.
fn init_tracing(debug: bool) -> reload::Handle<EnvFilter, Registry> {
    let (filter, handle) = reload::Layer::new(log_filter_for(debug));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
    handle
}

fn print_help() {
    println!(
        r#"forksh {}

Usage:
  forksh [OPTIONS]

Options:
  -c, --config <path>   Read settings from <path> instead of ~/.forksh_config
  -d, --debug           Log debug output to stderr
  -h, --help            Show this help
  -V, --version         Show version

Inside the shell, type 'help' for the built-in commands."#,
        env!("CARGO_PKG_VERSION")
    );
}
