//! The compile → load → normalize cycle and its entry operations.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::config::{Address, Config, Context, Options, PackageMeta, ValueExt};
use crate::error::{ConfigError, SchemaViolation, WatchError};
use crate::extension::{Extension, ExtensionRunner, EXTEND_CONFIG_HOOK};
use crate::normalize::{self, env, DotenvResolver, EnvResolver, Environment};
use crate::pipeline::PipelineGenerator;
use crate::script::{CompiledScript, FactoryResult, ModuleRegistry, ScriptCompiler};
use crate::snapshot::Snapshot;
use crate::watch::{BuildEventSource, ChangeWatcher, Clock, CompileSession, TokioClock};

/// Result of one successful cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    /// The canonical configuration
    pub config: Config,
    /// Regenerated pipeline configuration (first cycle or pipeline-affecting change)
    pub pipeline: Option<Value>,
    /// Whether the whitelisted subtrees changed against the session baseline
    pub pipeline_affecting: bool,
}

/// What [`ConfigFile::compile_and_load`] produced
pub enum Loaded {
    /// One-shot compilation
    Once(CycleOutput),
    /// Continuous compilation; drive the watcher to receive updates
    Watching(CycleOutput, Box<ChangeWatcher<CompileSession>>),
}

/// A user config script and everything needed to turn it into a [`Config`].
pub struct ConfigFile {
    ctx: Context,
    options: Options,
    project_root: PathBuf,
    compiler: ScriptCompiler,
    registry: ModuleRegistry,
    extensions: ExtensionRunner,
    env_resolver: Box<dyn EnvResolver>,
    pipeline: Option<Box<dyn PipelineGenerator>>,
    address: Option<(Address, Address)>,
    current: Option<Config>,
    pipeline_config: Option<Value>,
}

impl std::fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFile")
            .field("entry", &self.compiler.entry())
            .field("ctx", &self.ctx)
            .field("options", &self.options)
            .field("extensions", &self.extensions)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl ConfigFile {
    /// Create a config file handle; the project root is the script's directory.
    pub fn new(entry: impl Into<PathBuf>, ctx: Context, options: Options) -> Self {
        let compiler = ScriptCompiler::new(entry);
        let project_root = compiler.entry_dir();
        Self {
            ctx,
            options,
            project_root,
            compiler,
            registry: ModuleRegistry::new(),
            extensions: ExtensionRunner::new(),
            env_resolver: Box::new(DotenvResolver),
            pipeline: None,
            address: None,
            current: None,
            pipeline_config: None,
        }
    }

    /// Override the project root.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Register an extension whose hook runs every cycle.
    pub fn with_extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.register(extension);
        self
    }

    pub fn with_env_resolver(mut self, resolver: impl EnvResolver + 'static) -> Self {
        self.env_resolver = Box::new(resolver);
        self
    }

    pub fn with_pipeline(mut self, generator: impl PipelineGenerator + 'static) -> Self {
        self.pipeline = Some(Box::new(generator));
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn compiler(&self) -> &ScriptCompiler {
        &self.compiler
    }

    /// The last successfully computed configuration.
    pub fn current(&self) -> Option<&Config> {
        self.current.as_ref()
    }

    /// The last generated pipeline configuration.
    pub fn pipeline_config(&self) -> Option<&Value> {
        self.pipeline_config.as_ref()
    }

    /// Compile once and run the first cycle; every error is fatal.
    pub async fn read(&mut self) -> Result<CycleOutput, ConfigError> {
        let compiled = self.compiler.compile()?;
        self.cycle(&compiled, true, None).await
    }

    /// Start a continuous session watching the script and its local imports.
    pub fn watch(self) -> Result<ChangeWatcher<CompileSession>, ConfigError> {
        let session = CompileSession::new(self.compiler.clone())?;
        self.watch_with(session)
    }

    /// Start a continuous session fed by `source`.
    pub fn watch_with<S: BuildEventSource>(self, source: S) -> Result<ChangeWatcher<S>, ConfigError> {
        self.watch_with_clock(source, TokioClock)
    }

    /// Start a continuous session fed by `source`, timing updates with `clock`.
    pub fn watch_with_clock<S: BuildEventSource, C: Clock>(
        mut self,
        source: S,
        clock: C,
    ) -> Result<ChangeWatcher<S, C>, ConfigError> {
        let callbacks = self.options.watch.take().ok_or(WatchError::MissingCallbacks)?;
        Ok(ChangeWatcher::new(self, source, callbacks, clock))
    }

    /// One-shot or continuous, selected by the presence of watch callbacks.
    ///
    /// In continuous mode this resolves once the first build has been
    /// normalized; the returned watcher is unarmed.
    pub async fn compile_and_load(mut self) -> Result<Loaded, ConfigError> {
        if self.options.watch.is_none() {
            return self.read().await.map(Loaded::Once);
        }
        let mut watcher = self.watch()?;
        let output = watcher.first_cycle().await?;
        Ok(Loaded::Watching(output, Box::new(watcher)))
    }

    /// Run one cycle over a compiled artifact.
    ///
    /// With `fail_on_error` every error is returned. Otherwise it is logged,
    /// the previous configuration is kept and `Ok(None)` is returned.
    /// `baseline` is the session's snapshot; it is replaced only when the
    /// cycle succeeds.
    pub async fn run_cycle(
        &mut self,
        compiled: &CompiledScript,
        fail_on_error: bool,
        baseline: Option<&mut Option<Snapshot>>,
    ) -> Result<Option<CycleOutput>, ConfigError> {
        match self.cycle(compiled, fail_on_error, baseline).await {
            Ok(output) => Ok(Some(output)),
            Err(e) if fail_on_error => Err(e),
            Err(e) => {
                tracing::warn!("{}", e);
                tracing::warn!("Keeping the previous configuration");
                Ok(None)
            }
        }
    }

    async fn cycle(
        &mut self,
        compiled: &CompiledScript,
        first: bool,
        baseline: Option<&mut Option<Snapshot>>,
    ) -> Result<CycleOutput, ConfigError> {
        // Phase A: export and factory result shape
        let factory = self.registry.load(compiled)?.into_factory()?;
        let mut ctx = self.ctx.clone();
        let user = match self.registry.call_factory(&compiled.artifact, &factory, &ctx).await? {
            FactoryResult::Object(value) => value,
            FactoryResult::NotAnObject(found) => return Err(SchemaViolation::NotAnObject(found).into()),
        };

        // Phase B
        let mut cfg = normalize::prepare(user, &ctx);
        if ctx.dev {
            let requested = normalize::requested_address(self.options.host.as_deref(), self.options.port, &cfg);
            let actual =
                normalize::resolve_address(requested, self.options.on_address.as_deref(), &mut self.address).await?;
            cfg.set_at("devServer.host", json!(actual.host));
            cfg.set_at("devServer.port", json!(actual.port));
        }

        self.extensions.run_hook(EXTEND_CONFIG_HOOK, &mut cfg).await?;

        let snapshot = baseline.is_some().then(|| Snapshot::capture(&cfg));
        let pipeline_affecting = match &snapshot {
            Some(current) => current.differs_from(baseline.as_deref().and_then(Option::as_ref)),
            None => false,
        };

        let package = PackageMeta::load(&self.project_root)?;
        let environment =
            Environment { project_root: &self.project_root, package: &package, live_reload: self.options.live_reload };
        normalize::derive(&mut cfg, &mut ctx, &environment)?;

        let request = env::env_request(&cfg, &ctx, &self.project_root);
        let file_env = self.env_resolver.resolve(&request).await?;
        cfg.set_at("__meta.fileEnv", json!(file_env));

        let config = Config::new(cfg);
        let pipeline = if first || pipeline_affecting {
            match &self.pipeline {
                Some(generator) => Some(
                    generator.generate(&config).await.map_err(|e| ConfigError::Pipeline(e.to_string()))?,
                ),
                None => None,
            }
        } else {
            None
        };

        if let (Some(slot), Some(snapshot)) = (baseline, snapshot) {
            *slot = Some(snapshot);
        }
        if pipeline.is_some() {
            self.pipeline_config = pipeline.clone();
        }
        self.current = Some(config.clone());
        tracing::info!(
            "Config ready ({} {}{})",
            ctx.mode_name,
            ctx.build_type(),
            if pipeline_affecting { ", pipeline affected" } else { "" }
        );
        Ok(CycleOutput { config, pipeline, pipeline_affecting })
    }
}
