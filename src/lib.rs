//! # Browser Host Config
//!
//! Process-wide configuration for an embedded browser host.
//!
//! A host application configures a single [`config::ProcessConfiguration`]
//! before it starts the engine, creates browser controls, binds objects or
//! launches subprocesses. Each of those events is a *freeze point*: the
//! consumer reads its settings once at that moment and keeps them. Settings
//! that are read on every operation (`wcf_close_timeout`,
//! `concurrent_task_execution`) stay writable for the whole process lifetime.
//!
//! ## Quick Start
//!
//! ```rust
//! use browser_host_config::{
//!     browser::Engine,
//!     config::{FreezePoint, ProcessConfiguration, ProxyOptions},
//! };
//! use std::sync::Arc;
//!
//! // Configure first
//! let config = Arc::new(ProcessConfiguration::new());
//! config.set_wcf_enabled(true).unwrap();
//! config.set_proxy(Some(ProxyOptions::new("127.0.0.1", 3128))).unwrap();
//!
//! // Then initialize
//! let engine = Engine::initialize(Arc::clone(&config)).unwrap();
//! assert!(engine.startup().wcf_enabled);
//! assert!(config.is_frozen(FreezePoint::EngineInit));
//!
//! // Engine settings are latched now; live settings are not
//! assert!(config.set_wcf_enabled(false).is_err());
//! config.set_concurrent_task_execution(true).unwrap();
//! ```
//!
//! ## Module Overview
//!
//! - [`config`]: The configuration container, setting catalogue and settings files
//! - [`browser`]: Engine initialization, browser controls, subprocess launch
//! - [`binding`]: Object registration, async method dispatch, synchronous channel close
//!
//! ## Freeze Points
//!
//! | Freeze point | Settings latched |
//! |---|---|
//! | engine initialization | `wcf_enabled`, `proxy`, `focused_node_changed_enabled` |
//! | first browser control | `shutdown_on_exit` |
//! | first object binding | both binding property names, `legacy_javascript_binding_enabled` |
//! | subprocess start | `subprocess_exit_if_parent_closed` |
//!
//! Writes after a freeze point are rejected in [`config::WriteMode::Strict`]
//! (the default) and stored with a warning in [`config::WriteMode::Lenient`].

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Full version string with name
pub const FULL_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Module Exports
// ============================================================================

/// Process configuration, setting catalogue and settings files.
pub mod config;

/// Engine initialization, browser controls and subprocess launch.
pub mod browser;

/// Object binding, async method dispatch and the synchronous binding channel.
pub mod binding;

// ============================================================================
// Re-exports for Convenience
// ============================================================================

// Config types
pub use config::{
    ConfigError, FreezePoint, ProcessConfiguration, ProxyOptions, ProxyType, ReadDiscipline,
    Setting, SettingValue, SettingsSnapshot, WriteMode,
};

// Browser types
pub use browser::{
    BrowserControl, CommandLineSwitch, ControlRuntime, Engine, EngineStartup, ExitHook,
    ProcessType, SubprocessLaunch,
};

// Binding types
pub use binding::{
    ChannelHost, CloseOutcome, DispatchMode, MethodRunnerQueue, ObjectRegistry, ScriptContext,
    SyncBindingHost,
};

// ============================================================================
// Prelude Module
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```rust
/// use browser_host_config::prelude::*;
/// ```
pub mod prelude {
    pub use crate::binding::{MethodRunnerQueue, ObjectRegistry};
    pub use crate::browser::{ControlRuntime, Engine, SubprocessLaunch};
    pub use crate::config::{FreezePoint, ProcessConfiguration, Setting, SettingValue, WriteMode};
    pub use crate::{FULL_VERSION, NAME, VERSION};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constants() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
        assert!(FULL_VERSION.contains(VERSION));
        assert!(FULL_VERSION.contains(NAME));
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;
        let config = ProcessConfiguration::new();
        assert_eq!(config.mode(), WriteMode::Strict);
        let _ = VERSION;
    }
}
