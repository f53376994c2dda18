//! Browser-side consumers of the process configuration.
//!
//! Each submodule reads its settings at one lifecycle event and fires the
//! matching freeze point.
//!
//! # Submodules
//!
//! - [`engine`] - Engine initialization and derived command-line switches
//! - [`control`] - Browser control creation and the process-exit hook
//! - [`subprocess`] - Browser subprocess launch parameters

pub mod control;
pub mod engine;
pub mod subprocess;

pub use control::{BrowserControl, ControlRuntime, ExitHook};
pub use engine::{CommandLineSwitch, Engine, EngineStartup};
pub use subprocess::{ProcessType, SubprocessLaunch};
