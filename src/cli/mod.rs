//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod inspect;
mod watch;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::{Context, ModeName, Options};
use crate::normalize::PortProbe;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "APPCONF_LOG";

/// appconf - Compile app build-configuration scripts into canonical configuration
#[derive(Parser)]
#[command(name = "appconf")]
#[command(about = "appconf - Compile Lua build-configuration scripts into canonical app configuration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the config script once and print the canonical configuration
    Inspect {
        #[command(flatten)]
        target: TargetArgs,

        /// Only print the value at this dotted path (e.g. build.publicPath)
        #[arg(long)]
        path: Option<String>,
    },

    /// Watch the config script and report app/pipeline updates as they settle
    Watch {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// What to build and for which target
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Config script
    #[arg(short, long, default_value = "app.config.lua")]
    pub config: PathBuf,

    /// Mode: spa, ssr, pwa, cordova, capacitor, electron, bex
    #[arg(short, long, default_value = "spa")]
    pub mode: ModeName,

    /// Production build (development otherwise)
    #[arg(long)]
    pub prod: bool,

    /// Debug build (forces source maps)
    #[arg(long)]
    pub debug: bool,

    /// Target platform of shell modes (e.g. linux, ios, all)
    #[arg(short = 'T', long)]
    pub target: Option<String>,

    /// Target architecture of shell modes (e.g. x64)
    #[arg(short = 'A', long)]
    pub arch: Option<String>,

    /// Dev-server host, overriding the script
    #[arg(long)]
    pub host: Option<String>,

    /// Dev-server port, overriding the script
    #[arg(long)]
    pub port: Option<u16>,

    /// Move to the next free port when the requested one is taken
    #[arg(long)]
    pub probe_port: bool,

    /// Disable live reload in the dev-server options
    #[arg(long)]
    pub no_live_reload: bool,
}

impl TargetArgs {
    /// Build context for these arguments.
    pub fn context(&self) -> Context {
        let mut ctx = if self.prod { Context::prod(self.mode) } else { Context::dev(self.mode) };
        ctx = ctx.with_debug(self.debug);
        if let Some(target) = &self.target {
            ctx = ctx.with_target(target.clone());
        }
        if let Some(arch) = &self.arch {
            ctx = ctx.with_arch(arch.clone());
        }
        ctx
    }

    /// Caller options for these arguments (without watch callbacks).
    pub fn options(&self) -> Options {
        let mut options = Options { live_reload: !self.no_live_reload, ..Options::default() };
        if let Some(host) = &self.host {
            options = options.with_host(host.clone());
        }
        if let Some(port) = self.port {
            options = options.with_port(port);
        }
        if self.probe_port {
            options = options.with_negotiator(PortProbe::default());
        }
        options
    }

    /// Check the config script exists before doing any work.
    fn check_config(&self) -> Result<(), ExitCode> {
        if self.config.is_file() {
            return Ok(());
        }
        tracing::error!("Config script not found: {}", self.config.display());
        Err(ExitCode::from(EXIT_INVALID_ARGS))
    }
}

/// Initialise the tracing subscriber from `APPCONF_LOG` (default `info`).
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).try_init();
}

/// Single-threaded runtime driving one command.
fn runtime() -> Result<tokio::runtime::Runtime, ExitCode> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|e| {
        tracing::error!("Failed to start runtime: {}", e);
        ExitCode::from(EXIT_ERROR)
    })
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Inspect { target, path } => inspect::run_inspect(&target, path.as_deref()),
        Commands::Watch { target } => watch::run_watch(&target),
    }
}
