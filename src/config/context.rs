//! Build context and caller options.
//!
//! The [`Context`] describes what is being built (mode, target, dev/prod).
//! [`Options`] carries the caller's knobs: explicit host/port, the address
//! negotiator and the watch-mode callbacks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalize::AddressNegotiator;

/// Deployment mode the configuration is computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModeName {
    /// Single page application
    #[default]
    Spa,
    /// Server-side rendered application
    Ssr,
    /// Installable web app
    Pwa,
    /// Cordova mobile shell
    Cordova,
    /// Capacitor mobile shell
    Capacitor,
    /// Electron desktop shell
    Electron,
    /// Browser extension
    Bex,
}

impl ModeName {
    /// All modes, in declaration order.
    pub const ALL: [ModeName; 7] = [
        ModeName::Spa,
        ModeName::Ssr,
        ModeName::Pwa,
        ModeName::Cordova,
        ModeName::Capacitor,
        ModeName::Electron,
        ModeName::Bex,
    ];

    /// Lowercase name used in paths and env tables.
    pub fn as_str(self) -> &'static str {
        match self {
            ModeName::Spa => "spa",
            ModeName::Ssr => "ssr",
            ModeName::Pwa => "pwa",
            ModeName::Cordova => "cordova",
            ModeName::Capacitor => "capacitor",
            ModeName::Electron => "electron",
            ModeName::Bex => "bex",
        }
    }

    /// Modes packaged into an installable shell (desktop, mobile, extension).
    pub fn is_shell(self) -> bool {
        matches!(self, ModeName::Cordova | ModeName::Capacitor | ModeName::Electron | ModeName::Bex)
    }

    /// Modes that serve the app from a URL path and honour a custom public path.
    pub fn serves_from_path(self) -> bool {
        matches!(self, ModeName::Spa | ModeName::Pwa | ModeName::Ssr)
    }

    /// Shells whose build output is staged unpackaged before packaging.
    pub fn is_staged(self) -> bool {
        matches!(self, ModeName::Electron | ModeName::Bex)
    }
}

impl fmt::Display for ModeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModeName::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown mode '{}'", s))
    }
}

/// One boolean per mode; exactly the active mode is set, plus `pwa` when an
/// SSR build enables its installable-web-app layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModeFlags {
    pub spa: bool,
    pub ssr: bool,
    pub pwa: bool,
    pub cordova: bool,
    pub capacitor: bool,
    pub electron: bool,
    pub bex: bool,
}

impl ModeFlags {
    fn for_mode(mode: ModeName) -> Self {
        let mut flags = ModeFlags::default();
        match mode {
            ModeName::Spa => flags.spa = true,
            ModeName::Ssr => flags.ssr = true,
            ModeName::Pwa => flags.pwa = true,
            ModeName::Cordova => flags.cordova = true,
            ModeName::Capacitor => flags.capacitor = true,
            ModeName::Electron => flags.electron = true,
            ModeName::Bex => flags.bex = true,
        }
        flags
    }
}

/// Immutable descriptor of the build target, handed to the config factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Development build
    pub dev: bool,
    /// Production build
    pub prod: bool,
    /// Debug build (source maps forced on)
    pub debug: bool,
    /// Active mode
    pub mode_name: ModeName,
    /// Per-mode flags
    pub mode: ModeFlags,
    /// Target platform of a shell build (e.g. `linux`, `ios`, `all`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    /// Target architecture of a shell build (e.g. `x64`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch_name: Option<String>,
}

impl Context {
    /// Create a development context for a mode.
    pub fn dev(mode: ModeName) -> Self {
        Self::new(mode, true)
    }

    /// Create a production context for a mode.
    pub fn prod(mode: ModeName) -> Self {
        Self::new(mode, false)
    }

    fn new(mode: ModeName, dev: bool) -> Self {
        Self {
            dev,
            prod: !dev,
            debug: false,
            mode_name: mode,
            mode: ModeFlags::for_mode(mode),
            target_name: None,
            arch_name: None,
        }
    }

    /// Set debug mode.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the shell target platform.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = Some(target.into());
        self
    }

    /// Set the shell target architecture.
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch_name = Some(arch.into());
        self
    }

    /// Build type name used by env file resolution.
    pub fn build_type(&self) -> &'static str {
        if self.dev {
            "dev"
        } else {
            "prod"
        }
    }
}

/// A dev-server host/port pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Callbacks invoked when accumulated edits settle in watch mode.
pub struct WatchCallbacks {
    /// Lightweight in-app update (no pipeline rebuild)
    pub on_app_change: Box<dyn FnMut()>,
    /// Full pipeline rebuild
    pub on_build_change: Box<dyn FnMut()>,
}

impl WatchCallbacks {
    pub fn new(on_app_change: impl FnMut() + 'static, on_build_change: impl FnMut() + 'static) -> Self {
        Self { on_app_change: Box::new(on_app_change), on_build_change: Box::new(on_build_change) }
    }
}

impl fmt::Debug for WatchCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchCallbacks").finish_non_exhaustive()
    }
}

/// Caller-supplied knobs for a configuration session
pub struct Options {
    /// Explicit dev-server host (wins over the script)
    pub host: Option<String>,
    /// Explicit dev-server port (wins over the script)
    pub port: Option<u16>,
    /// Negotiates the actual address for a requested one
    pub on_address: Option<Box<dyn AddressNegotiator>>,
    /// Watch-mode callbacks; their presence selects continuous compilation
    pub watch: Option<WatchCallbacks>,
    /// Whether the caller wants live-reload semantics (dev-server `hmr`)
    pub live_reload: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { host: None, port: None, on_address: None, watch: None, live_reload: true }
    }
}

impl Options {
    /// Set an explicit host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set an explicit port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the address negotiator.
    pub fn with_negotiator(mut self, negotiator: impl AddressNegotiator + 'static) -> Self {
        self.on_address = Some(Box::new(negotiator));
        self
    }

    /// Enable watch mode with the given callbacks.
    pub fn with_watch(mut self, callbacks: WatchCallbacks) -> Self {
        self.watch = Some(callbacks);
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("on_address", &self.on_address.is_some())
            .field("watch", &self.watch.is_some())
            .field("live_reload", &self.live_reload)
            .finish()
    }
}
