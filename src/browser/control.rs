//! Browser control instantiation and the process-exit hook.
//!
//! The first control created against a configuration latches
//! `shutdown_on_exit`. If it is set, a shutdown callback is registered with the
//! host's [`ExitHook`] exactly once per configuration, no matter how many
//! runtimes share it, how many controls are created, or how many threads race
//! to create the first one.

use once_cell::sync::OnceCell;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{FreezePoint, ProcessConfiguration};

/// Host application exit notification, e.g. an application-exit event.
pub trait ExitHook: Send + Sync {
    /// Registers `on_exit` to run when the host application exits.
    fn register(&self, on_exit: Box<dyn Fn() + Send + Sync>);
}

/// A browser control hosted by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserControl {
    pub id: Uuid,
    pub address: String,
}

/// Creates browser controls and owns the exit-hook decision.
pub struct ControlRuntime {
    config: Arc<ProcessConfiguration>,
    exit_hook: Arc<dyn ExitHook>,
    /// `shutdown_on_exit` as latched by the first control on the configuration.
    shutdown_on_exit: OnceCell<bool>,
    controls_created: AtomicUsize,
}

impl ControlRuntime {
    pub fn new(config: Arc<ProcessConfiguration>, exit_hook: Arc<dyn ExitHook>) -> Self {
        Self {
            config,
            exit_hook,
            shutdown_on_exit: OnceCell::new(),
            controls_created: AtomicUsize::new(0),
        }
    }

    /// Creates a control showing `address`.
    pub fn create_control(&self, address: impl Into<String>) -> BrowserControl {
        self.shutdown_on_exit
            .get_or_init(|| self.install_exit_hook());

        let control = BrowserControl {
            id: Uuid::new_v4(),
            address: address.into(),
        };
        self.controls_created.fetch_add(1, Ordering::SeqCst);
        debug!(control_id = %control.id, address = %control.address, "browser control created");
        control
    }

    fn install_exit_hook(&self) -> bool {
        let point = FreezePoint::FirstBrowserControl;
        let fired = match self
            .config
            .freeze_with(point, |snapshot| Ok::<_, Infallible>(snapshot.shutdown_on_exit))
        {
            Ok(fired) => fired,
            Err(never) => match never {},
        };

        let Some(shutdown_on_exit) = fired else {
            // Another control on this configuration already decided.
            let latched = self
                .config
                .latched(point)
                .map(|snapshot| snapshot.shutdown_on_exit)
                .unwrap_or_else(|| self.config.shutdown_on_exit());
            debug!(shutdown_on_exit = latched, "exit hook already handled for this configuration");
            return latched;
        };

        if shutdown_on_exit {
            let config = Arc::clone(&self.config);
            self.exit_hook.register(Box::new(move || {
                if config.request_shutdown() {
                    info!("host application exiting, engine shutdown requested");
                }
            }));
            info!("exit hook registered");
        } else {
            info!("shutdown on exit disabled, exit hook not registered");
        }

        shutdown_on_exit
    }

    /// The latched `shutdown_on_exit` value, once the first control exists.
    pub fn shutdown_on_exit(&self) -> Option<bool> {
        self.shutdown_on_exit.get().copied()
    }

    /// Whether the exit hook has fired.
    pub fn exit_requested(&self) -> bool {
        self.config.shutdown_requested()
    }

    pub fn controls_created(&self) -> usize {
        self.controls_created.load(Ordering::SeqCst)
    }
}
