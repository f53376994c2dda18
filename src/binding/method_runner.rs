//! Dispatch of async binding method calls.
//!
//! By default calls run one at a time, in the order they were queued, on a
//! single worker task. When `concurrent_task_execution` is set every call is
//! spawned on the tokio runtime instead. The flag is read on each dispatch.

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::ProcessConfiguration;

/// How a call was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sequential,
    Concurrent,
}

/// Handle to a dispatched call.
#[derive(Debug)]
pub struct PendingCall<T> {
    pub call_id: u64,
    pub mode: DispatchMode,
    receiver: oneshot::Receiver<T>,
}

impl<T> PendingCall<T> {
    /// Waits for the call to finish.
    pub async fn result(self) -> Result<T> {
        self.receiver
            .await
            .map_err(|_| anyhow!("Method call {} was dropped before completing", self.call_id))
    }
}

/// Queue executing bound-object method calls.
///
/// Must be started inside a tokio runtime.
pub struct MethodRunnerQueue {
    config: Arc<ProcessConfiguration>,
    sender: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
    worker: JoinHandle<()>,
    next_call_id: AtomicU64,
}

impl MethodRunnerQueue {
    pub fn start(config: Arc<ProcessConfiguration>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();
        let worker = tokio::spawn(async move {
            while let Some(call) = receiver.recv().await {
                call.await;
            }
            debug!("method runner worker stopped");
        });

        Self {
            config,
            sender,
            worker,
            next_call_id: AtomicU64::new(1),
        }
    }

    /// Schedules `call` according to the current `concurrent_task_execution` value.
    pub fn dispatch<F, T>(&self, call: F) -> Result<PendingCall<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let call_id = self.next_call_id.fetch_add(1, Ordering::SeqCst);
        let (tx, receiver) = oneshot::channel();
        let task = async move {
            let _ = tx.send(call.await);
        };

        let mode = if self.config.concurrent_task_execution() {
            tokio::spawn(task);
            DispatchMode::Concurrent
        } else {
            self.sender
                .send(task.boxed())
                .map_err(|_| anyhow!("Method runner has stopped"))?;
            DispatchMode::Sequential
        };

        trace!(call_id, mode = ?mode, "method call dispatched");
        Ok(PendingCall {
            call_id,
            mode,
            receiver,
        })
    }

    /// Stops accepting calls and waits for queued sequential calls to finish.
    pub async fn stop(self) -> Result<()> {
        let Self { sender, worker, .. } = self;
        drop(sender);
        worker
            .await
            .map_err(|e| anyhow!("Method runner worker failed: {}", e))
    }
}
