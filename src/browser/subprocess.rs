//! Browser subprocess launch parameters.
//!
//! A subprocess reads `subprocess_exit_if_parent_closed` once, when it starts,
//! and from then on decides on its own whether a vanished host process means
//! it should exit.

use std::fmt;
use tracing::debug;

use super::engine::CommandLineSwitch;
use crate::config::{FreezePoint, ProcessConfiguration};

/// Kind of browser subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessType {
    Renderer,
    Gpu,
    Utility,
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessType::Renderer => write!(f, "renderer"),
            ProcessType::Gpu => write!(f, "gpu-process"),
            ProcessType::Utility => write!(f, "utility"),
        }
    }
}

/// Parameters a subprocess starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessLaunch {
    pub process_type: ProcessType,
    pub host_process_id: u32,
    /// Latched at start; later configuration writes do not reach a running subprocess.
    pub exit_if_parent_closed: bool,
    /// Engine switches forwarded to the subprocess.
    pub switches: Vec<CommandLineSwitch>,
}

impl SubprocessLaunch {
    /// Starts a subprocess description, firing [`FreezePoint::SubprocessStart`].
    pub fn start(
        config: &ProcessConfiguration,
        process_type: ProcessType,
        host_process_id: u32,
        engine_switches: &[CommandLineSwitch],
    ) -> Self {
        config.freeze(FreezePoint::SubprocessStart);
        let exit_if_parent_closed = config.subprocess_exit_if_parent_closed();

        debug!(
            process_type = %process_type,
            host_process_id,
            exit_if_parent_closed,
            "subprocess starting"
        );

        Self {
            process_type,
            host_process_id,
            exit_if_parent_closed,
            switches: engine_switches.to_vec(),
        }
    }

    /// Command-line arguments of the subprocess.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            CommandLineSwitch::new("type", self.process_type.to_string()).to_string(),
            CommandLineSwitch::new("host-process-id", self.host_process_id.to_string())
                .to_string(),
        ];
        if self.exit_if_parent_closed {
            args.push(CommandLineSwitch::flag("exit-if-parent-closed").to_string());
        }
        args.extend(self.switches.iter().map(ToString::to_string));
        args
    }

    /// Whether the subprocess should exit given the host's liveness.
    pub fn should_exit(&self, parent_alive: bool) -> bool {
        self.exit_if_parent_closed && !parent_alive
    }
}
