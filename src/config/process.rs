//! The process-wide configuration container.
//!
//! [`ProcessConfiguration`] holds every host setting together with the set of
//! freeze points that have fired so far. Consumers receive it as an
//! `Arc<ProcessConfiguration>` and either snapshot a setting when their
//! lifecycle event occurs or read it on every operation, as recorded in
//! [`Setting::read_discipline`].
//!
//! # Example
//!
//! ```rust
//! use browser_host_config::config::{FreezePoint, ProcessConfiguration, WriteMode};
//!
//! let config = ProcessConfiguration::new();
//! config.set_wcf_enabled(true).unwrap();
//!
//! config.freeze(FreezePoint::EngineInit);
//! assert_eq!(config.mode(), WriteMode::Strict);
//! assert!(config.set_wcf_enabled(false).is_err());
//! assert!(config.wcf_enabled());
//! ```

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::setting::{FreezePoint, Setting, SettingValue, WriteMode};
use super::settings::{timeout_millis, ConfigError, ProxyOptions, SettingsSnapshot};

static GLOBAL: Lazy<Arc<ProcessConfiguration>> =
    Lazy::new(|| Arc::new(ProcessConfiguration::new()));

/// Storage cell of one setting.
enum Slot<'a> {
    Text(&'a RwLock<String>),
    Flag(&'a AtomicBool),
    Duration(&'a RwLock<Duration>),
    Proxy(&'a RwLock<Option<ProxyOptions>>),
}

impl Slot<'_> {
    fn load(&self) -> SettingValue {
        match self {
            Slot::Text(cell) => SettingValue::Text(cell.read().clone()),
            Slot::Flag(cell) => SettingValue::Flag(cell.load(Ordering::SeqCst)),
            Slot::Duration(cell) => SettingValue::Duration(*cell.read()),
            Slot::Proxy(cell) => SettingValue::Proxy(cell.read().clone()),
        }
    }

    fn store(&self, setting: Setting, value: SettingValue) -> Result<(), ConfigError> {
        match (self, value) {
            (Slot::Text(cell), SettingValue::Text(text)) => *cell.write() = text,
            (Slot::Flag(cell), SettingValue::Flag(flag)) => cell.store(flag, Ordering::SeqCst),
            (Slot::Duration(cell), SettingValue::Duration(duration)) => *cell.write() = duration,
            (Slot::Proxy(cell), SettingValue::Proxy(proxy)) => *cell.write() = proxy,
            (_, value) => {
                return Err(ConfigError::TypeMismatch {
                    setting,
                    expected: setting.kind(),
                    actual: value.kind(),
                })
            }
        }
        Ok(())
    }
}

/// Named, typed settings shared by the engine, browser controls, the binding
/// subsystem and subprocesses.
///
/// Every field is defaulted inside the constructor, so reads never fail.
/// Booleans are atomics and multi-word values sit behind a lock, which keeps
/// concurrent readers from observing a half-written proxy or timeout.
#[derive(Debug)]
pub struct ProcessConfiguration {
    mode: WriteMode,

    binding_property_name: RwLock<String>,
    binding_property_name_camel_case: RwLock<String>,
    legacy_binding_enabled: AtomicBool,
    wcf_enabled: AtomicBool,
    wcf_close_timeout: RwLock<Duration>,
    shutdown_on_exit: AtomicBool,
    subprocess_exit_if_parent_closed: AtomicBool,
    proxy: RwLock<Option<ProxyOptions>>,
    concurrent_task_execution: AtomicBool,
    focused_node_changed_enabled: AtomicBool,

    /// One flag per [`FreezePoint`], indexed by `FreezePoint::index`.
    frozen: [AtomicBool; 4],
    /// Values as they were when each freeze point fired.
    latched: [OnceCell<SettingsSnapshot>; 4],
    /// Shared by writes, exclusive while a freeze point fires or a snapshot is
    /// taken. An accepted strict write is therefore visible to any consumer
    /// that snapshots after the freeze.
    freeze_gate: RwLock<()>,

    shutdown_requested: AtomicBool,
}

impl Default for ProcessConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessConfiguration {
    /// Creates a configuration with every documented default in strict mode.
    pub fn new() -> Self {
        Self::from_snapshot(SettingsSnapshot::default())
    }

    /// Creates a configuration with default values and the given write mode.
    pub fn with_mode(mode: WriteMode) -> Self {
        Self::from_snapshot(SettingsSnapshot::default().with_write_mode(mode))
    }

    /// Creates a configuration seeded from a snapshot, e.g. one loaded from a file.
    pub fn from_snapshot(snapshot: SettingsSnapshot) -> Self {
        Self {
            mode: snapshot.write_mode,
            binding_property_name: RwLock::new(snapshot.javascript_binding_property_name),
            binding_property_name_camel_case: RwLock::new(
                snapshot.javascript_binding_property_name_camel_case,
            ),
            legacy_binding_enabled: AtomicBool::new(snapshot.legacy_javascript_binding_enabled),
            wcf_enabled: AtomicBool::new(snapshot.wcf_enabled),
            wcf_close_timeout: RwLock::new(Duration::from_millis(snapshot.wcf_close_timeout_ms)),
            shutdown_on_exit: AtomicBool::new(snapshot.shutdown_on_exit),
            subprocess_exit_if_parent_closed: AtomicBool::new(
                snapshot.subprocess_exit_if_parent_closed,
            ),
            proxy: RwLock::new(snapshot.proxy),
            concurrent_task_execution: AtomicBool::new(snapshot.concurrent_task_execution),
            focused_node_changed_enabled: AtomicBool::new(snapshot.focused_node_changed_enabled),
            frozen: Default::default(),
            latched: Default::default(),
            freeze_gate: RwLock::new(()),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    /// Lazily created process-wide instance for hosts that do not pass a
    /// configuration down explicitly.
    pub fn global() -> Arc<ProcessConfiguration> {
        Arc::clone(&GLOBAL)
    }

    /// Handling of writes after a freeze point.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    fn slot(&self, setting: Setting) -> Slot<'_> {
        match setting {
            Setting::JavascriptBindingPropertyName => Slot::Text(&self.binding_property_name),
            Setting::JavascriptBindingPropertyNameCamelCase => {
                Slot::Text(&self.binding_property_name_camel_case)
            }
            Setting::LegacyJavascriptBindingEnabled => Slot::Flag(&self.legacy_binding_enabled),
            Setting::WcfEnabled => Slot::Flag(&self.wcf_enabled),
            Setting::WcfCloseTimeout => Slot::Duration(&self.wcf_close_timeout),
            Setting::ShutdownOnExit => Slot::Flag(&self.shutdown_on_exit),
            Setting::SubprocessExitIfParentClosed => {
                Slot::Flag(&self.subprocess_exit_if_parent_closed)
            }
            Setting::Proxy => Slot::Proxy(&self.proxy),
            Setting::ConcurrentTaskExecution => Slot::Flag(&self.concurrent_task_execution),
            Setting::FocusedNodeChangedEnabled => Slot::Flag(&self.focused_node_changed_enabled),
        }
    }

    /// Returns the current value of `setting`.
    pub fn get(&self, setting: Setting) -> SettingValue {
        self.slot(setting).load()
    }

    /// Overwrites `setting`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::TypeMismatch`] if `value` is not of the setting's kind.
    /// - [`ConfigError::SettingFrozen`] in [`WriteMode::Strict`] once the
    ///   setting's freeze point has fired. In [`WriteMode::Lenient`] the value
    ///   is stored and only a warning is logged.
    pub fn set(&self, setting: Setting, value: SettingValue) -> Result<(), ConfigError> {
        if value.kind() != setting.kind() {
            return Err(ConfigError::TypeMismatch {
                setting,
                expected: setting.kind(),
                actual: value.kind(),
            });
        }

        let _gate = self.freeze_gate.read();
        let Some(freeze_point) = setting.freeze_point() else {
            self.slot(setting).store(setting, value)?;
            debug!(setting = %setting, "live setting updated");
            return Ok(());
        };

        if self.is_frozen(freeze_point) {
            match self.mode {
                WriteMode::Strict => {
                    warn!(
                        setting = %setting,
                        freeze_point = %freeze_point,
                        "rejected write to frozen setting"
                    );
                    return Err(ConfigError::SettingFrozen {
                        setting,
                        freeze_point,
                    });
                }
                WriteMode::Lenient => {
                    warn!(
                        setting = %setting,
                        freeze_point = %freeze_point,
                        "stale write to frozen setting; running consumers keep their snapshot"
                    );
                }
            }
        }

        self.slot(setting).store(setting, value)?;
        debug!(setting = %setting, "setting updated");
        Ok(())
    }

    /// Records that `point` has occurred. Returns `true` only for the first call.
    pub fn freeze(&self, point: FreezePoint) -> bool {
        match self.freeze_with(point, |_| Ok::<_, Infallible>(())) {
            Ok(fired) => fired.is_some(),
            Err(never) => match never {},
        }
    }

    /// Fires `point` only if `latch` accepts the values as they stand.
    ///
    /// `latch` receives a consistent snapshot while writes are held off. If it
    /// fails, the point stays unfired and the offending setting can still be
    /// corrected. Returns `Ok(None)` when the point had already fired; the
    /// values latched at that time are available from [`Self::latched`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use browser_host_config::config::{FreezePoint, ProcessConfiguration};
    ///
    /// let config = ProcessConfiguration::new();
    /// config.set_binding_property_name("").unwrap();
    ///
    /// let check = |s: &browser_host_config::config::SettingsSnapshot| s.validate();
    /// assert!(config.freeze_with(FreezePoint::FirstObjectBinding, check).is_err());
    /// assert!(!config.is_frozen(FreezePoint::FirstObjectBinding));
    ///
    /// config.set_binding_property_name("Host").unwrap();
    /// assert!(config.freeze_with(FreezePoint::FirstObjectBinding, check).unwrap().is_some());
    /// ```
    pub fn freeze_with<T, E>(
        &self,
        point: FreezePoint,
        latch: impl FnOnce(&SettingsSnapshot) -> Result<T, E>,
    ) -> Result<Option<T>, E> {
        let _gate = self.freeze_gate.write();
        if self.is_frozen(point) {
            return Ok(None);
        }

        let snapshot = self.read_values();
        let latched = latch(&snapshot)?;

        // Latched values are published before the flag so readers of a fired
        // point always find them.
        let _ = self.latched[point.index()].set(snapshot);
        self.frozen[point.index()].store(true, Ordering::SeqCst);
        info!(freeze_point = %point, "configuration freeze point reached");
        Ok(Some(latched))
    }

    /// Values as they were when `point` fired, or `None` if it has not.
    pub fn latched(&self, point: FreezePoint) -> Option<&SettingsSnapshot> {
        self.latched[point.index()].get()
    }

    pub fn is_frozen(&self, point: FreezePoint) -> bool {
        self.frozen[point.index()].load(Ordering::SeqCst)
    }

    /// Whether consumers of `setting` have already latched its value.
    /// Always `false` for live-read settings.
    pub fn is_setting_frozen(&self, setting: Setting) -> bool {
        setting
            .freeze_point()
            .map(|point| self.is_frozen(point))
            .unwrap_or(false)
    }

    /// Freeze points fired so far.
    pub fn frozen_points(&self) -> Vec<FreezePoint> {
        FreezePoint::ALL
            .iter()
            .copied()
            .filter(|point| self.is_frozen(*point))
            .collect()
    }

    /// Copies every current value into a serializable snapshot.
    ///
    /// Writes are held off while copying, so the snapshot never mixes the
    /// values before and after a concurrent write.
    pub fn snapshot(&self) -> SettingsSnapshot {
        let _gate = self.freeze_gate.write();
        self.read_values()
    }

    /// Caller must hold `freeze_gate`.
    fn read_values(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            javascript_binding_property_name: self.binding_property_name(),
            javascript_binding_property_name_camel_case: self.binding_property_name_camel_case(),
            legacy_javascript_binding_enabled: self.legacy_javascript_binding_enabled(),
            wcf_enabled: self.wcf_enabled(),
            wcf_close_timeout_ms: timeout_millis(self.wcf_close_timeout()),
            shutdown_on_exit: self.shutdown_on_exit(),
            subprocess_exit_if_parent_closed: self.subprocess_exit_if_parent_closed(),
            proxy: self.proxy(),
            concurrent_task_execution: self.concurrent_task_execution(),
            focused_node_changed_enabled: self.focused_node_changed_enabled(),
            write_mode: self.mode,
        }
    }

    /// Records that the host application asked for shutdown. Returns `true`
    /// for the first request only.
    pub fn request_shutdown(&self) -> bool {
        !self.shutdown_requested.swap(true, Ordering::SeqCst)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    // Typed accessors

    pub fn binding_property_name(&self) -> String {
        self.binding_property_name.read().clone()
    }

    pub fn set_binding_property_name(&self, name: impl Into<String>) -> Result<(), ConfigError> {
        self.set(
            Setting::JavascriptBindingPropertyName,
            SettingValue::Text(name.into()),
        )
    }

    pub fn binding_property_name_camel_case(&self) -> String {
        self.binding_property_name_camel_case.read().clone()
    }

    pub fn set_binding_property_name_camel_case(
        &self,
        name: impl Into<String>,
    ) -> Result<(), ConfigError> {
        self.set(
            Setting::JavascriptBindingPropertyNameCamelCase,
            SettingValue::Text(name.into()),
        )
    }

    pub fn legacy_javascript_binding_enabled(&self) -> bool {
        self.legacy_binding_enabled.load(Ordering::SeqCst)
    }

    pub fn set_legacy_javascript_binding_enabled(&self, enabled: bool) -> Result<(), ConfigError> {
        self.set(
            Setting::LegacyJavascriptBindingEnabled,
            SettingValue::Flag(enabled),
        )
    }

    pub fn wcf_enabled(&self) -> bool {
        self.wcf_enabled.load(Ordering::SeqCst)
    }

    pub fn set_wcf_enabled(&self, enabled: bool) -> Result<(), ConfigError> {
        self.set(Setting::WcfEnabled, SettingValue::Flag(enabled))
    }

    /// Zero means the channel host is aborted instead of closed gracefully.
    pub fn wcf_close_timeout(&self) -> Duration {
        *self.wcf_close_timeout.read()
    }

    pub fn set_wcf_close_timeout(&self, timeout: Duration) -> Result<(), ConfigError> {
        self.set(Setting::WcfCloseTimeout, SettingValue::Duration(timeout))
    }

    pub fn shutdown_on_exit(&self) -> bool {
        self.shutdown_on_exit.load(Ordering::SeqCst)
    }

    pub fn set_shutdown_on_exit(&self, enabled: bool) -> Result<(), ConfigError> {
        self.set(Setting::ShutdownOnExit, SettingValue::Flag(enabled))
    }

    pub fn subprocess_exit_if_parent_closed(&self) -> bool {
        self.subprocess_exit_if_parent_closed.load(Ordering::SeqCst)
    }

    pub fn set_subprocess_exit_if_parent_closed(&self, enabled: bool) -> Result<(), ConfigError> {
        self.set(
            Setting::SubprocessExitIfParentClosed,
            SettingValue::Flag(enabled),
        )
    }

    pub fn proxy(&self) -> Option<ProxyOptions> {
        self.proxy.read().clone()
    }

    pub fn set_proxy(&self, proxy: Option<ProxyOptions>) -> Result<(), ConfigError> {
        self.set(Setting::Proxy, SettingValue::Proxy(proxy))
    }

    pub fn concurrent_task_execution(&self) -> bool {
        self.concurrent_task_execution.load(Ordering::SeqCst)
    }

    pub fn set_concurrent_task_execution(&self, enabled: bool) -> Result<(), ConfigError> {
        self.set(Setting::ConcurrentTaskExecution, SettingValue::Flag(enabled))
    }

    pub fn focused_node_changed_enabled(&self) -> bool {
        self.focused_node_changed_enabled.load(Ordering::SeqCst)
    }

    pub fn set_focused_node_changed_enabled(&self, enabled: bool) -> Result<(), ConfigError> {
        self.set(
            Setting::FocusedNodeChangedEnabled,
            SettingValue::Flag(enabled),
        )
    }
}
