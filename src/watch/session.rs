//! Continuous compilation: build events driven by file changes.

use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::error::{ConfigError, WatchError};
use crate::script::compiler::ARTIFACT_SUFFIX;
use crate::script::{CompiledScript, ScriptCompiler};

/// File system debounce applied before a change is considered.
pub const FS_DEBOUNCE: Duration = Duration::from_millis(100);

/// Compiler notifications of one watch session
#[derive(Debug)]
pub enum BuildEvent {
    /// A recompilation is starting
    Started,
    /// A recompilation finished
    Finished(Result<CompiledScript, ConfigError>),
}

/// Anything that produces build events, one at a time.
#[async_trait(?Send)]
pub trait BuildEventSource {
    /// Next event, or `None` when the session is over.
    async fn next_event(&mut self) -> Option<BuildEvent>;
}

#[async_trait(?Send)]
impl BuildEventSource for UnboundedReceiver<BuildEvent> {
    async fn next_event(&mut self) -> Option<BuildEvent> {
        self.recv().await
    }
}

/// Recompiles the entry script whenever one of its inputs changes.
///
/// The first `Started`/`Finished` pair is produced for the initial compile
/// without waiting for any file event.
pub struct CompileSession {
    compiler: ScriptCompiler,
    debouncer: Debouncer<RecommendedWatcher>,
    changes: UnboundedReceiver<Vec<PathBuf>>,
    watched_dirs: HashSet<PathBuf>,
    inputs: HashSet<PathBuf>,
    last_failed: bool,
    announce: bool,
    build_due: bool,
}

impl std::fmt::Debug for CompileSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileSession")
            .field("entry", &self.compiler.entry())
            .field("watched_dirs", &self.watched_dirs)
            .finish_non_exhaustive()
    }
}

impl CompileSession {
    /// Start watching the entry script's directory.
    pub fn new(compiler: ScriptCompiler) -> Result<Self, WatchError> {
        let (tx, changes) = unbounded_channel();
        let debouncer = new_debouncer(FS_DEBOUNCE, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .collect();
                if !paths.is_empty() {
                    // the receiver is gone once the session is dropped
                    let _ = tx.send(paths);
                }
            }
            Err(error) => tracing::warn!("Watch error: {:?}", error),
        })
        .map_err(WatchError::WatcherInit)?;

        let entry_dir = compiler.entry_dir();
        let entry_dir = entry_dir.canonicalize().unwrap_or(entry_dir);
        let entry = compiler.entry().canonicalize().unwrap_or_else(|_| compiler.entry().to_path_buf());

        let mut session = Self {
            compiler,
            debouncer,
            changes,
            watched_dirs: HashSet::new(),
            inputs: HashSet::from([entry]),
            last_failed: false,
            announce: true,
            build_due: false,
        };
        session.watch_dir(&entry_dir).map_err(WatchError::WatchPath)?;
        Ok(session)
    }

    fn watch_dir(&mut self, dir: &Path) -> notify::Result<()> {
        if self.watched_dirs.contains(dir) {
            return Ok(());
        }
        self.debouncer.watcher().watch(dir, RecursiveMode::NonRecursive)?;
        self.watched_dirs.insert(dir.to_path_buf());
        tracing::debug!("Watching {}", dir.display());
        Ok(())
    }

    /// Track the inputs of the latest successful build.
    fn refresh_watch_set(&mut self, inputs: &[PathBuf]) {
        self.inputs = inputs.iter().cloned().collect();
        let wanted: HashSet<PathBuf> = inputs.iter().filter_map(|p| p.parent().map(Path::to_path_buf)).collect();

        for dir in &wanted {
            if let Err(e) = self.watch_dir(dir) {
                tracing::warn!("Cannot watch {}: {}", dir.display(), e);
            }
        }
        let stale: Vec<PathBuf> = self.watched_dirs.difference(&wanted).cloned().collect();
        for dir in stale {
            if let Err(e) = self.debouncer.watcher().unwatch(&dir) {
                tracing::debug!("Cannot unwatch {}: {}", dir.display(), e);
            }
            self.watched_dirs.remove(&dir);
        }
    }

    /// Whether a changed path should trigger a rebuild.
    ///
    /// After a failed build any Lua file in a watched directory counts, since
    /// the failure may be a missing import that now exists.
    fn is_relevant(&self, path: &Path) -> bool {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.inputs.contains(&path) {
            return true;
        }
        self.last_failed
            && path.extension().is_some_and(|ext| ext == "lua")
            && !path.to_string_lossy().ends_with(ARTIFACT_SUFFIX)
    }

    fn rebuild(&mut self) -> BuildEvent {
        let result = self.compiler.compile();
        match &result {
            Ok(compiled) => {
                self.last_failed = false;
                let inputs = compiled.inputs.clone();
                self.refresh_watch_set(&inputs);
            }
            Err(_) => self.last_failed = true,
        }
        BuildEvent::Finished(result)
    }
}

#[async_trait(?Send)]
impl BuildEventSource for CompileSession {
    async fn next_event(&mut self) -> Option<BuildEvent> {
        loop {
            if self.announce {
                self.announce = false;
                self.build_due = true;
                return Some(BuildEvent::Started);
            }
            if self.build_due {
                self.build_due = false;
                return Some(self.rebuild());
            }
            let paths = self.changes.recv().await?;
            if let Some(changed) = paths.iter().find(|p| self.is_relevant(p)) {
                tracing::info!("Changed: {}", changed.display());
                self.announce = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_channel_source() {
        let (tx, mut rx) = unbounded_channel();
        tx.send(BuildEvent::Started).unwrap();
        drop(tx);

        assert!(matches!(rx.next_event().await, Some(BuildEvent::Started)));
        assert!(rx.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_initial_build_without_file_events() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("app.config.lua");
        fs::write(&entry, "return function() return {} end").unwrap();

        let mut session = CompileSession::new(ScriptCompiler::new(&entry)).unwrap();
        assert!(matches!(session.next_event().await, Some(BuildEvent::Started)));
        match session.next_event().await {
            Some(BuildEvent::Finished(Ok(compiled))) => {
                assert!(compiled.artifact.exists());
                fs::remove_file(&compiled.artifact).unwrap();
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_relevance_filter() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("app.config.lua");
        fs::write(&entry, "return function() return {} end").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();
        fs::write(temp.path().join("other.lua"), "").unwrap();

        let mut session = CompileSession::new(ScriptCompiler::new(&entry)).unwrap();
        assert!(session.is_relevant(&entry));
        assert!(!session.is_relevant(&temp.path().join("notes.txt")));
        assert!(!session.is_relevant(&temp.path().join("other.lua")));

        session.last_failed = true;
        assert!(session.is_relevant(&temp.path().join("other.lua")));
        assert!(!session.is_relevant(&temp.path().join("app.config.lua.temporary.compiled.lua")));
    }
}
