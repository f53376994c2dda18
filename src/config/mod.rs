//! Process-wide configuration for the browser host.
//!
//! This module provides:
//! - [`ProcessConfiguration`], the shared settings container with freeze points
//! - The setting catalogue ([`Setting`], [`FreezePoint`], [`ReadDiscipline`])
//! - Loading and saving settings files (TOML/JSON) via [`SettingsSnapshot`]
//! - Validation and defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use browser_host_config::config::{ProcessConfiguration, SettingsSnapshot};
//! use std::sync::Arc;
//!
//! // Load from a file, or start from defaults
//! let snapshot = SettingsSnapshot::from_file("host.toml").unwrap();
//! snapshot.validate().unwrap();
//!
//! let config = Arc::new(ProcessConfiguration::from_snapshot(snapshot));
//! config.set_concurrent_task_execution(true).unwrap();
//! ```

mod process;
mod setting;
mod settings;

pub use process::ProcessConfiguration;
pub use setting::{FreezePoint, ReadDiscipline, Setting, SettingValue, ValueKind, WriteMode};
pub use settings::{
    ConfigError, ProxyCredentials, ProxyOptions, ProxyType, SettingsSnapshot,
    DEFAULT_BINDING_PROPERTY_NAME, DEFAULT_BINDING_PROPERTY_NAME_CAMEL_CASE,
    DEFAULT_WCF_CLOSE_TIMEOUT,
};

pub(crate) use settings::validate_property_name;
