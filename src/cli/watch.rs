//! Watch command implementation

use std::process::ExitCode;

use crate::config::WatchCallbacks;
use crate::config_file::ConfigFile;

use super::{runtime, TargetArgs, EXIT_ERROR, EXIT_SUCCESS};

/// Execute the watch command
///
/// Runs until the process is interrupted; prints one line per delivered update.
pub fn run_watch(args: &TargetArgs) -> ExitCode {
    if let Err(code) = args.check_config() {
        return code;
    }
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(code) => return code,
    };

    let callbacks = WatchCallbacks::new(|| println!("app: config updated"), || println!("pipeline: config updated"));
    let file = ConfigFile::new(&args.config, args.context(), args.options().with_watch(callbacks));

    runtime.block_on(async move {
        let mut watcher = match file.watch() {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };

        match watcher.first_cycle().await {
            Ok(output) => {
                if let Some(url) = output.config.app_url() {
                    tracing::info!("App URL: {}", url);
                }
                tracing::info!("Watching {} for changes...", args.config.display());
            }
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }

        watcher.arm();
        match watcher.run().await {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                tracing::error!("{}", e);
                ExitCode::from(EXIT_ERROR)
            }
        }
    })
}
