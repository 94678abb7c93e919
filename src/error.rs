//! Error types shared by the compile, load and normalize stages.
//!
//! Whether an error ends the session or only degrades the current cycle is
//! decided by the caller of a cycle, never by the error itself: the first
//! cycle of any session treats every variant as fatal, later cycles of a
//! continuous session log it and keep the previous configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::Address;

/// Boxed error returned by external collaborators (extensions, pipeline generators).
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// A compile diagnostic with file location information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDiagnostic {
    /// Path to the file containing the problem
    pub file: PathBuf,
    /// Line number (1-indexed, None if unknown)
    pub line: Option<usize>,
    /// Diagnostic message
    pub message: String,
}

impl ScriptDiagnostic {
    /// Create a new diagnostic with file and message
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { file: file.into(), line: None, message: message.into() }
    }

    /// Create a diagnostic with line information
    pub fn with_line(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self { file: file.into(), line: Some(line), message: message.into() }
    }
}

impl std::fmt::Display for ScriptDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Shape violations of the script export or of the factory result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// The effective export is not callable.
    #[error("export is not a function (got {0})")]
    NotAFunction(String),
    /// The factory returned something other than a table.
    #[error("factory did not return an object (got {0})")]
    NotAnObject(String),
}

/// Configuration pipeline error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The script (or one of its local imports) failed to compile
    #[error("Failed to compile {}:\n{}", .entry.display(), .diagnostics.iter().map(|d| format!("  - {}", d)).collect::<Vec<_>>().join("\n"))]
    Compile { entry: PathBuf, diagnostics: Vec<ScriptDiagnostic> },

    /// Evaluating the compiled module body failed
    #[error("Failed to load compiled config {}: {message}", .artifact.display())]
    Load { artifact: PathBuf, message: String },

    /// The export or the factory result has the wrong shape
    #[error("Invalid config script: {0}")]
    Schema(#[from] SchemaViolation),

    /// The factory raised an error
    #[error("Config factory raised an error: {0}")]
    Runtime(String),

    /// Address negotiation declined the requested host/port
    #[error("No usable address for the dev server (requested {0})")]
    Network(Address),

    /// The installable-web-app manifest is unusable
    #[error("Invalid app manifest: {0}")]
    Manifest(String),

    /// An enumerated option holds an unsupported value
    #[error("Invalid value {value:?} for {key} (expected one of: {expected})")]
    ConfigValue { key: String, value: String, expected: String },

    /// An extension hook failed
    #[error("Extension({id}) failed while extending the configuration: {message}")]
    Extension { id: String, message: String },

    /// The downstream pipeline generator failed
    #[error("Failed to generate pipeline configuration: {0}")]
    Pipeline(String),

    /// Environment files could not be resolved
    #[error("Failed to resolve env files: {0}")]
    Env(String),

    /// The watch session could not be set up or ended early
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Build a [`ConfigError::ConfigValue`] from an offending value and its allowed set.
    pub fn invalid_value(key: &str, value: impl Into<String>, expected: &[&str]) -> Self {
        ConfigError::ConfigValue {
            key: key.to_string(),
            value: value.into(),
            expected: expected.join(", "),
        }
    }
}

/// Error during watch mode setup
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Watch mode was requested without update callbacks
    #[error("Watch mode requires update callbacks in the options")]
    MissingCallbacks,
    /// The build event source ended before the first build finished
    #[error("Watch session ended before the first build finished")]
    SessionEnded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_new() {
        let diag = ScriptDiagnostic::new("app.config.lua", "Invalid syntax");
        assert_eq!(diag.file, PathBuf::from("app.config.lua"));
        assert_eq!(diag.line, None);
        assert_eq!(diag.message, "Invalid syntax");
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = ScriptDiagnostic::with_line("lib/util.lua", 5, "unexpected symbol near 'end'");
        let display = format!("{}", diag);
        assert_eq!(display, "lib/util.lua:5: unexpected symbol near 'end'");
    }

    #[test]
    fn test_compile_error_lists_diagnostics() {
        let err = ConfigError::Compile {
            entry: PathBuf::from("app.config.lua"),
            diagnostics: vec![
                ScriptDiagnostic::with_line("a.lua", 1, "first"),
                ScriptDiagnostic::new("b.lua", "second"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("  - a.lua:1: first"));
        assert!(msg.contains("  - b.lua: second"));
    }

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigError::invalid_value("pwa.workboxMode", "Bogus", &["GenerateSW", "InjectManifest"]);
        assert_eq!(
            err.to_string(),
            "Invalid value \"Bogus\" for pwa.workboxMode (expected one of: GenerateSW, InjectManifest)"
        );
    }

    #[test]
    fn test_schema_violation_display() {
        let err: ConfigError = SchemaViolation::NotAnObject("number".into()).into();
        assert_eq!(err.to_string(), "Invalid config script: factory did not return an object (got number)");
    }
}
