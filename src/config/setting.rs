//! Setting catalogue: names, value kinds, freeze points and read discipline.
//!
//! Every configurable field of [`ProcessConfiguration`](super::ProcessConfiguration)
//! has an entry in [`Setting`]. The catalogue records which lifecycle event
//! latches the field for its consumers and whether those consumers read it once
//! or on every operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::settings::{ConfigError, ProxyOptions};

/// Lifecycle events after which some settings are latched by their consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezePoint {
    /// The single browser engine initialization call.
    EngineInit,
    /// Construction of the first browser control in the process.
    FirstBrowserControl,
    /// The first object registration with the binding subsystem.
    FirstObjectBinding,
    /// Start of a browser subprocess.
    SubprocessStart,
}

impl FreezePoint {
    /// All freeze points, in declaration order.
    pub const ALL: [FreezePoint; 4] = [
        FreezePoint::EngineInit,
        FreezePoint::FirstBrowserControl,
        FreezePoint::FirstObjectBinding,
        FreezePoint::SubprocessStart,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            FreezePoint::EngineInit => 0,
            FreezePoint::FirstBrowserControl => 1,
            FreezePoint::FirstObjectBinding => 2,
            FreezePoint::SubprocessStart => 3,
        }
    }
}

impl fmt::Display for FreezePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreezePoint::EngineInit => write!(f, "engine initialization"),
            FreezePoint::FirstBrowserControl => write!(f, "first browser control creation"),
            FreezePoint::FirstObjectBinding => write!(f, "first object binding"),
            FreezePoint::SubprocessStart => write!(f, "subprocess start"),
        }
    }
}

/// How a consumer reads a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDiscipline {
    /// Read once when the freeze point fires and retained afterwards.
    SnapshotOnce(FreezePoint),
    /// Read fresh on every relevant operation; never frozen.
    LiveRead,
}

/// Behaviour of a write to a setting whose freeze point has already fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Reject the write with [`ConfigError::SettingFrozen`] and keep the old value.
    #[default]
    Strict,
    /// Store the value and log a warning; consumers keep their snapshot.
    Lenient,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Strict => write!(f, "strict"),
            WriteMode::Lenient => write!(f, "lenient"),
        }
    }
}

/// Names of the process-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    JavascriptBindingPropertyName,
    JavascriptBindingPropertyNameCamelCase,
    LegacyJavascriptBindingEnabled,
    WcfEnabled,
    WcfCloseTimeout,
    ShutdownOnExit,
    SubprocessExitIfParentClosed,
    Proxy,
    ConcurrentTaskExecution,
    FocusedNodeChangedEnabled,
}

/// The kind of value a setting holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Flag,
    Duration,
    Proxy,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Text => write!(f, "text"),
            ValueKind::Flag => write!(f, "flag"),
            ValueKind::Duration => write!(f, "duration"),
            ValueKind::Proxy => write!(f, "proxy"),
        }
    }
}

impl Setting {
    /// Every setting, in table order.
    pub const ALL: [Setting; 10] = [
        Setting::JavascriptBindingPropertyName,
        Setting::JavascriptBindingPropertyNameCamelCase,
        Setting::LegacyJavascriptBindingEnabled,
        Setting::WcfEnabled,
        Setting::WcfCloseTimeout,
        Setting::ShutdownOnExit,
        Setting::SubprocessExitIfParentClosed,
        Setting::Proxy,
        Setting::ConcurrentTaskExecution,
        Setting::FocusedNodeChangedEnabled,
    ];

    /// The snake_case name used in settings files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Setting::JavascriptBindingPropertyName => "javascript_binding_property_name",
            Setting::JavascriptBindingPropertyNameCamelCase => {
                "javascript_binding_property_name_camel_case"
            }
            Setting::LegacyJavascriptBindingEnabled => "legacy_javascript_binding_enabled",
            Setting::WcfEnabled => "wcf_enabled",
            Setting::WcfCloseTimeout => "wcf_close_timeout",
            Setting::ShutdownOnExit => "shutdown_on_exit",
            Setting::SubprocessExitIfParentClosed => "subprocess_exit_if_parent_closed",
            Setting::Proxy => "proxy",
            Setting::ConcurrentTaskExecution => "concurrent_task_execution",
            Setting::FocusedNodeChangedEnabled => "focused_node_changed_enabled",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Setting::JavascriptBindingPropertyName
            | Setting::JavascriptBindingPropertyNameCamelCase => ValueKind::Text,
            Setting::WcfCloseTimeout => ValueKind::Duration,
            Setting::Proxy => ValueKind::Proxy,
            _ => ValueKind::Flag,
        }
    }

    /// The lifecycle event after which consumers stop observing writes,
    /// or `None` for live-read settings.
    pub fn freeze_point(self) -> Option<FreezePoint> {
        match self.read_discipline() {
            ReadDiscipline::SnapshotOnce(point) => Some(point),
            ReadDiscipline::LiveRead => None,
        }
    }

    pub fn read_discipline(self) -> ReadDiscipline {
        use ReadDiscipline::*;
        match self {
            Setting::JavascriptBindingPropertyName
            | Setting::JavascriptBindingPropertyNameCamelCase
            | Setting::LegacyJavascriptBindingEnabled => {
                SnapshotOnce(FreezePoint::FirstObjectBinding)
            }
            Setting::WcfEnabled | Setting::Proxy | Setting::FocusedNodeChangedEnabled => {
                SnapshotOnce(FreezePoint::EngineInit)
            }
            Setting::ShutdownOnExit => SnapshotOnce(FreezePoint::FirstBrowserControl),
            Setting::SubprocessExitIfParentClosed => SnapshotOnce(FreezePoint::SubprocessStart),
            Setting::WcfCloseTimeout | Setting::ConcurrentTaskExecution => LiveRead,
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Setting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Setting::ALL
            .iter()
            .copied()
            .find(|setting| setting.name() == normalized)
            .ok_or_else(|| ConfigError::UnknownSetting(s.to_string()))
    }
}

/// A setting value of any kind, used by the generic accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Text(String),
    Flag(bool),
    Duration(Duration),
    Proxy(Option<ProxyOptions>),
}

impl SettingValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            SettingValue::Text(_) => ValueKind::Text,
            SettingValue::Flag(_) => ValueKind::Flag,
            SettingValue::Duration(_) => ValueKind::Duration,
            SettingValue::Proxy(_) => ValueKind::Proxy,
        }
    }

    /// Parses a textual value for `setting`.
    ///
    /// Flags accept `true/false/1/0/yes/no/on/off`, durations are whole
    /// milliseconds, and proxies use `[type://][user[:pass]@]host:port` with
    /// `none` clearing the proxy.
    ///
    /// # Example
    ///
    /// ```rust
    /// use browser_host_config::config::{Setting, SettingValue};
    /// use std::time::Duration;
    ///
    /// let value = SettingValue::parse(Setting::WcfCloseTimeout, "500").unwrap();
    /// assert_eq!(value, SettingValue::Duration(Duration::from_millis(500)));
    /// ```
    pub fn parse(setting: Setting, raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        match setting.kind() {
            ValueKind::Text => Ok(SettingValue::Text(raw.to_string())),
            ValueKind::Flag => match raw.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(SettingValue::Flag(true)),
                "false" | "0" | "no" | "off" => Ok(SettingValue::Flag(false)),
                _ => Err(ConfigError::ValidationError(format!(
                    "{} expects a boolean, got '{}'",
                    setting, raw
                ))),
            },
            ValueKind::Duration => raw
                .parse::<u64>()
                .map(|ms| SettingValue::Duration(Duration::from_millis(ms)))
                .map_err(|_| {
                    ConfigError::ValidationError(format!(
                        "{} expects milliseconds, got '{}'",
                        setting, raw
                    ))
                }),
            ValueKind::Proxy => {
                if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
                    Ok(SettingValue::Proxy(None))
                } else {
                    Ok(SettingValue::Proxy(Some(raw.parse()?)))
                }
            }
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Text(text) => write!(f, "{}", text),
            SettingValue::Flag(flag) => write!(f, "{}", flag),
            SettingValue::Duration(duration) if duration.subsec_nanos() % 1_000_000 == 0 => {
                write!(f, "{}ms", duration.as_millis())
            }
            SettingValue::Duration(duration) => write!(f, "{:?}", duration),
            SettingValue::Proxy(Some(proxy)) => write!(f, "{}", proxy),
            SettingValue::Proxy(None) => write!(f, "none"),
        }
    }
}
