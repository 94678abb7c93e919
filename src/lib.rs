//! appconf - Library for compiling app build-configuration scripts
//!
//! This library provides functionality to:
//! - Bundle a Lua configuration script and its local imports into one artifact
//! - Load the artifact, call its config factory and normalize the result
//!   into a canonical configuration
//! - Watch the script and classify each change as app-level or
//!   pipeline-affecting, coalescing rapid edits into one update

pub mod cli;
pub mod config;
pub mod config_file;
pub mod error;
pub mod extension;
pub mod normalize;
pub mod pipeline;
pub mod script;
pub mod snapshot;
pub mod watch;

pub use config::{Address, Config, Context, ModeName, Options, WatchCallbacks};
pub use config_file::{ConfigFile, CycleOutput, Loaded};
pub use error::{ConfigError, WatchError};
pub use watch::{ChangeWatcher, Severity};
