//! Inspect command implementation

use std::process::ExitCode;

use crate::config_file::ConfigFile;

use super::{runtime, TargetArgs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the inspect command
pub fn run_inspect(args: &TargetArgs, path: Option<&str>) -> ExitCode {
    if let Err(code) = args.check_config() {
        return code;
    }
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(code) => return code,
    };

    let mut file = ConfigFile::new(&args.config, args.context(), args.options());
    let output = match runtime.block_on(file.read()) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let value = match path {
        Some(path) => match output.config.get(path) {
            Some(value) => value.clone(),
            None => {
                tracing::error!("No value at '{}'", path);
                return ExitCode::from(EXIT_INVALID_ARGS);
            }
        },
        None => output.config.into_value(),
    };

    match serde_json::to_string_pretty(&value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            tracing::error!("Failed to serialize configuration: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
