//! Engine initialization.
//!
//! [`Engine::initialize`] is the single point at which the engine-level
//! settings (`wcf_enabled`, `proxy`, `focused_node_changed_enabled`) are read.
//! It snapshots those settings into an [`EngineStartup`], derives the
//! command-line switches handed to the engine and its subprocesses, and fires
//! [`FreezePoint::EngineInit`] only once the snapshot is valid.
//!
//! # Example
//!
//! ```rust
//! use browser_host_config::browser::Engine;
//! use browser_host_config::config::{ProcessConfiguration, ProxyOptions};
//! use std::sync::Arc;
//!
//! let config = Arc::new(ProcessConfiguration::new());
//! config.set_proxy(Some(ProxyOptions::new("127.0.0.1", 8888))).unwrap();
//!
//! let engine = Engine::initialize(Arc::clone(&config)).unwrap();
//! assert!(engine
//!     .startup()
//!     .switches
//!     .iter()
//!     .any(|s| s.to_string() == "--proxy-server=127.0.0.1:8888"));
//! ```

use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::binding::sync_channel::{ChannelHost, CloseOutcome, InProcessChannelHost, SyncBindingHost};
use crate::config::{FreezePoint, ProcessConfiguration, ProxyOptions, SettingsSnapshot};

/// A single `--name[=value]` engine switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLineSwitch {
    pub name: String,
    /// Empty for value-less switches.
    pub value: String,
}

impl CommandLineSwitch {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

impl fmt::Display for CommandLineSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "--{}", self.name)
        } else {
            write!(f, "--{}={}", self.name, self.value)
        }
    }
}

/// Engine-level settings as they were when the engine started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStartup {
    pub wcf_enabled: bool,
    pub proxy: Option<ProxyOptions>,
    pub focused_node_changed_enabled: bool,
    /// Switches derived from the settings above.
    pub switches: Vec<CommandLineSwitch>,
}

impl EngineStartup {
    fn from_snapshot(snapshot: &SettingsSnapshot) -> Result<Self> {
        let wcf_enabled = snapshot.wcf_enabled;
        let proxy = snapshot.proxy.clone();
        let focused_node_changed_enabled = snapshot.focused_node_changed_enabled;

        let mut switches = Vec::new();
        if let Some(ref proxy) = proxy {
            proxy.validate().context("Invalid proxy configuration")?;
            switches.push(CommandLineSwitch::new("proxy-server", proxy.server_switch()));
            if let Some(ref bypass) = proxy.bypass_list {
                switches.push(CommandLineSwitch::new("proxy-bypass-list", bypass.clone()));
            }
        }
        if wcf_enabled {
            switches.push(CommandLineSwitch::flag("wcf-enabled"));
        }
        if focused_node_changed_enabled {
            switches.push(CommandLineSwitch::flag("focused-node-changed-enabled"));
        }

        Ok(Self {
            wcf_enabled,
            proxy,
            focused_node_changed_enabled,
            switches,
        })
    }
}

/// An initialized browser engine.
///
/// Only one engine may be initialized per configuration.
pub struct Engine {
    config: Arc<ProcessConfiguration>,
    startup: EngineStartup,
    sync_binding: Option<SyncBindingHost>,
    is_running: AtomicBool,
}

impl Engine {
    /// Initializes the engine with the in-process synchronous binding host.
    pub fn initialize(config: Arc<ProcessConfiguration>) -> Result<Self> {
        Self::initialize_with_channel(config, Arc::new(InProcessChannelHost::new()))
    }

    /// Initializes the engine, using `channel_host` for the synchronous
    /// binding channel when `wcf_enabled` is set.
    ///
    /// # Errors
    ///
    /// Fails if an engine was already initialized against `config`, or if the
    /// configured proxy is invalid. In the latter case nothing is latched, so
    /// the proxy can be corrected and initialization retried.
    pub fn initialize_with_channel(
        config: Arc<ProcessConfiguration>,
        channel_host: Arc<dyn ChannelHost>,
    ) -> Result<Self> {
        let startup = config
            .freeze_with(FreezePoint::EngineInit, EngineStartup::from_snapshot)?
            .ok_or_else(|| anyhow!("Engine is already initialized for this configuration"))?;
        for switch in &startup.switches {
            debug!(switch = %switch, "engine switch");
        }

        let sync_binding = startup
            .wcf_enabled
            .then(|| SyncBindingHost::new(Arc::clone(&config), channel_host));

        info!(
            wcf_enabled = startup.wcf_enabled,
            proxy = startup.proxy.is_some(),
            focused_node_changed_enabled = startup.focused_node_changed_enabled,
            "engine initialized"
        );

        Ok(Self {
            config,
            startup,
            sync_binding,
            is_running: AtomicBool::new(true),
        })
    }

    pub fn startup(&self) -> &EngineStartup {
        &self.startup
    }

    pub fn config(&self) -> &Arc<ProcessConfiguration> {
        &self.config
    }

    /// The synchronous binding host, present only when WCF was enabled at init.
    pub fn sync_binding(&self) -> Option<&SyncBindingHost> {
        self.sync_binding.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Shuts the engine down, closing the synchronous binding channel if any.
    pub async fn shutdown(&self) -> Result<Option<CloseOutcome>> {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("Engine is not running"));
        }

        let outcome = match self.sync_binding {
            Some(ref host) => Some(host.close().await),
            None => None,
        };

        info!("engine shut down");
        Ok(outcome)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("startup", &self.startup)
            .field("sync_binding", &self.sync_binding.is_some())
            .field("is_running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, ProxyType, Setting, WriteMode};

    #[test]
    fn test_default_startup_has_no_switches() {
        let config = Arc::new(ProcessConfiguration::new());
        let engine = Engine::initialize(config).unwrap();

        assert!(engine.startup().switches.is_empty());
        assert!(engine.sync_binding().is_none());
        assert!(engine.is_running());
    }

    #[test]
    fn test_startup_switches() {
        let config = Arc::new(ProcessConfiguration::new());
        config
            .set_proxy(Some(
                ProxyOptions::new("10.0.0.5", 1080)
                    .with_type(ProxyType::Socks5)
                    .with_auth("user", "secret")
                    .with_bypass_list("localhost;127.0.0.1"),
            ))
            .unwrap();
        config.set_wcf_enabled(true).unwrap();
        config.set_focused_node_changed_enabled(true).unwrap();

        let engine = Engine::initialize(Arc::clone(&config)).unwrap();
        let switches: Vec<String> = engine
            .startup()
            .switches
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            switches,
            vec![
                "--proxy-server=socks5://10.0.0.5:1080",
                "--proxy-bypass-list=localhost;127.0.0.1",
                "--wcf-enabled",
                "--focused-node-changed-enabled",
            ]
        );
        assert!(!switches.iter().any(|s| s.contains("secret")));
        assert!(engine.sync_binding().is_some());
    }

    #[test]
    fn test_second_initialize_fails() {
        let config = Arc::new(ProcessConfiguration::new());
        let _engine = Engine::initialize(Arc::clone(&config)).unwrap();
        assert!(Engine::initialize(config).is_err());
    }

    #[test]
    fn test_invalid_proxy_can_be_corrected_and_init_retried() {
        let config = Arc::new(ProcessConfiguration::new());
        config.set_proxy(Some(ProxyOptions::new("", 3128))).unwrap();

        let err = Engine::initialize(Arc::clone(&config)).unwrap_err();
        assert!(err.to_string().contains("Invalid proxy configuration"));
        assert!(!config.is_frozen(FreezePoint::EngineInit));

        config
            .set_proxy(Some(ProxyOptions::new("127.0.0.1", 3128)))
            .unwrap();
        let engine = Engine::initialize(Arc::clone(&config)).unwrap();
        assert_eq!(
            engine.startup().switches[0].to_string(),
            "--proxy-server=127.0.0.1:3128"
        );
        assert!(config.is_frozen(FreezePoint::EngineInit));
    }

    #[test]
    fn test_proxy_is_immutable_after_init_in_strict_mode() {
        let config = Arc::new(ProcessConfiguration::new());
        let engine = Engine::initialize(Arc::clone(&config)).unwrap();

        let result = config.set_proxy(Some(ProxyOptions::new("late", 8080)));
        assert!(matches!(
            result,
            Err(ConfigError::SettingFrozen {
                setting: Setting::Proxy,
                freeze_point: FreezePoint::EngineInit,
            })
        ));
        assert!(config.proxy().is_none());
        assert!(engine.startup().proxy.is_none());
    }

    #[test]
    fn test_late_write_keeps_engine_snapshot_in_lenient_mode() {
        let config = Arc::new(ProcessConfiguration::with_mode(WriteMode::Lenient));
        let engine = Engine::initialize(Arc::clone(&config)).unwrap();

        config.set_focused_node_changed_enabled(true).unwrap();
        assert!(config.focused_node_changed_enabled());
        assert!(!engine.startup().focused_node_changed_enabled);
    }

    #[tokio::test]
    async fn test_shutdown_closes_sync_binding() {
        let config = Arc::new(ProcessConfiguration::new());
        config.set_wcf_enabled(true).unwrap();
        let engine = Engine::initialize(config).unwrap();

        let outcome = engine.shutdown().await.unwrap();
        assert_eq!(outcome, Some(CloseOutcome::Closed));
        assert!(!engine.is_running());
        assert!(engine.shutdown().await.is_err());
    }
}
