//! Watch mode
//!
//! A [`ChangeWatcher`] drives one continuous session: it pulls build events
//! from a [`BuildEventSource`], runs a normalization cycle for every
//! successful build and coalesces the resulting updates through an
//! [`UpdateScheduler`] before invoking the caller's callbacks.
//!
//! The watcher starts unarmed. Cycles still run while unarmed so the first
//! configuration can be produced, but nothing is scheduled until
//! [`ChangeWatcher::arm`] is called.

pub mod scheduler;
pub mod session;

pub use scheduler::{Clock, ManualClock, Severity, TokioClock, UpdateScheduler, UPDATE_DELAY};
pub use session::{BuildEvent, BuildEventSource, CompileSession, FS_DEBOUNCE};

use crate::config::{Config, WatchCallbacks};
use crate::config_file::{ConfigFile, CycleOutput};
use crate::error::{ConfigError, WatchError};
use crate::snapshot::Snapshot;

/// State of one watch session
#[derive(Debug)]
pub struct WatchState<C: Clock = TokioClock> {
    /// Whether update callbacks may be delivered
    pub armed: bool,
    /// Snapshot of the last successful cycle
    pub snapshot: Option<Snapshot>,
    /// Pending update and its deadline
    pub scheduler: UpdateScheduler<C>,
}

impl<C: Clock> WatchState<C> {
    pub fn new(clock: C) -> Self {
        Self { armed: false, snapshot: None, scheduler: UpdateScheduler::new(clock) }
    }
}

/// Drives a continuous configuration session.
pub struct ChangeWatcher<S, C: Clock = TokioClock> {
    config_file: ConfigFile,
    source: S,
    callbacks: WatchCallbacks,
    state: WatchState<C>,
    first_done: bool,
}

impl<S, C: Clock + std::fmt::Debug> std::fmt::Debug for ChangeWatcher<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("config_file", &self.config_file)
            .field("state", &self.state)
            .field("first_done", &self.first_done)
            .finish_non_exhaustive()
    }
}

impl<S: BuildEventSource, C: Clock> ChangeWatcher<S, C> {
    pub(crate) fn new(config_file: ConfigFile, source: S, callbacks: WatchCallbacks, clock: C) -> Self {
        Self { config_file, source, callbacks, state: WatchState::new(clock), first_done: false }
    }

    /// Start delivering update callbacks.
    pub fn arm(&mut self) {
        if !self.state.armed {
            tracing::debug!("Watch session armed");
        }
        self.state.armed = true;
    }

    pub fn state(&self) -> &WatchState<C> {
        &self.state
    }

    /// The last successfully computed configuration.
    pub fn current(&self) -> Option<&Config> {
        self.config_file.current()
    }

    pub fn config_file(&self) -> &ConfigFile {
        &self.config_file
    }

    /// Pull events until the first build has been normalized.
    ///
    /// Any error of the first build or its cycle is fatal.
    pub async fn first_cycle(&mut self) -> Result<CycleOutput, ConfigError> {
        while !self.first_done {
            let event = self.source.next_event().await.ok_or(WatchError::SessionEnded)?;
            self.handle_event(event).await?;
        }
        match self.config_file.current() {
            Some(config) => Ok(CycleOutput {
                config: config.clone(),
                pipeline: self.config_file.pipeline_config().cloned(),
                pipeline_affecting: true,
            }),
            None => Err(WatchError::SessionEnded.into()),
        }
    }

    /// Handle one build event.
    ///
    /// Returns the severity now pending when an update was scheduled. Errors
    /// are returned only for the first build of the session; later ones are
    /// logged and leave the previous configuration in place.
    pub async fn handle_event(&mut self, event: BuildEvent) -> Result<Option<Severity>, ConfigError> {
        let compiled = match event {
            BuildEvent::Started => {
                tracing::info!("Compiling {}...", self.config_file.compiler().entry().display());
                return Ok(None);
            }
            BuildEvent::Finished(Ok(compiled)) => compiled,
            BuildEvent::Finished(Err(e)) if !self.first_done => return Err(e),
            BuildEvent::Finished(Err(e)) => {
                tracing::warn!("{}", e);
                return Ok(None);
            }
        };

        let first = !self.first_done;
        let output = self.config_file.run_cycle(&compiled, first, Some(&mut self.state.snapshot)).await?;
        self.first_done = true;

        let Some(output) = output else {
            return Ok(None);
        };
        if first {
            return Ok(None);
        }
        if !self.state.armed {
            tracing::debug!("Update ignored: watch session not armed");
            return Ok(None);
        }

        let severity = if output.pipeline_affecting { Severity::Pipeline } else { Severity::App };
        Ok(Some(self.state.scheduler.schedule(severity)))
    }

    /// Fire the pending update if its deadline has passed.
    pub fn fire_due(&mut self) -> Option<Severity> {
        let severity = self.state.scheduler.take_due()?;
        match severity {
            Severity::App => {
                tracing::info!("App config changed");
                (self.callbacks.on_app_change)();
            }
            Severity::Pipeline => {
                tracing::info!("Build config changed");
                (self.callbacks.on_build_change)();
            }
        }
        Some(severity)
    }

    /// Process events and fire updates until the event source ends.
    ///
    /// A pending update is dropped when the source ends.
    pub async fn run(&mut self) -> Result<(), ConfigError> {
        loop {
            tokio::select! {
                event = self.source.next_event() => match event {
                    Some(event) => {
                        self.handle_event(event).await?;
                    }
                    None => break,
                },
                _ = self.state.scheduler.wait_due() => {
                    self.fire_due();
                }
            }
        }
        self.state.scheduler.cancel();
        Ok(())
    }
}
