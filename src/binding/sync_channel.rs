//! Shutdown path of the synchronous binding channel.
//!
//! The close timeout is read from the configuration on every close, so it can
//! be changed at any point in the process lifetime. A zero timeout aborts the
//! channel host immediately; otherwise the host gets that long to close
//! gracefully and is aborted if it fails or runs out of time.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ProcessConfiguration;

/// Transport endpoint hosting the synchronous binding channel.
#[async_trait]
pub trait ChannelHost: Send + Sync {
    /// Closes the channel gracefully.
    async fn close(&self) -> Result<()>;

    /// Tears the channel down without waiting.
    fn abort(&self);
}

/// Why a channel host was aborted instead of closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The configured close timeout was zero.
    ZeroTimeout,
    /// The graceful close did not finish within the timeout.
    TimedOut(Duration),
    /// The graceful close failed.
    CloseFailed(String),
}

/// Result of [`SyncBindingHost::close`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    Aborted(AbortReason),
    AlreadyClosed,
}

/// Owner of one synchronous binding channel host.
pub struct SyncBindingHost {
    config: Arc<ProcessConfiguration>,
    host: Arc<dyn ChannelHost>,
    closed: AtomicBool,
}

impl SyncBindingHost {
    pub fn new(config: Arc<ProcessConfiguration>, host: Arc<dyn ChannelHost>) -> Self {
        Self {
            config,
            host,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the channel host using the close timeout configured right now.
    pub async fn close(&self) -> CloseOutcome {
        if self.closed.swap(true, Ordering::SeqCst) {
            return CloseOutcome::AlreadyClosed;
        }

        let timeout = self.config.wcf_close_timeout();
        if timeout.is_zero() {
            debug!("close timeout is zero, aborting channel host");
            self.host.abort();
            return CloseOutcome::Aborted(AbortReason::ZeroTimeout);
        }

        match tokio::time::timeout(timeout, self.host.close()).await {
            Ok(Ok(())) => {
                debug!(timeout = ?timeout, "channel host closed");
                CloseOutcome::Closed
            }
            Ok(Err(e)) => {
                warn!(error = %e, "channel host close failed, aborting");
                self.host.abort();
                CloseOutcome::Aborted(AbortReason::CloseFailed(e.to_string()))
            }
            Err(_) => {
                warn!(
                    timeout = ?timeout,
                    "channel host close timed out, aborting"
                );
                self.host.abort();
                CloseOutcome::Aborted(AbortReason::TimedOut(timeout))
            }
        }
    }
}

/// Channel host living in the same process; closes immediately.
#[derive(Debug, Default)]
pub struct InProcessChannelHost {
    closed: AtomicBool,
    aborted: AtomicBool,
}

impl InProcessChannelHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelHost for InProcessChannelHost {
    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::AtomicUsize;

    /// Host whose graceful close takes `delay` and optionally fails.
    struct SlowHost {
        delay: Duration,
        fail: bool,
        closes: AtomicUsize,
        aborts: AtomicUsize,
    }

    impl SlowHost {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                delay,
                fail,
                closes: AtomicUsize::new(0),
                aborts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChannelHost for SlowHost {
        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(anyhow!("channel faulted"))
            } else {
                Ok(())
            }
        }

        fn abort(&self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_zero_timeout_aborts_without_closing() {
        let config = Arc::new(ProcessConfiguration::new());
        config.set_wcf_close_timeout(Duration::ZERO).unwrap();
        let host = SlowHost::new(Duration::from_millis(1), false);
        let binding = SyncBindingHost::new(config, host.clone());

        let outcome = binding.close().await;

        assert_eq!(outcome, CloseOutcome::Aborted(AbortReason::ZeroTimeout));
        assert_eq!(host.closes.load(Ordering::SeqCst), 0);
        assert_eq!(host.aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_graceful_close_within_timeout() {
        let config = Arc::new(ProcessConfiguration::new());
        let host = SlowHost::new(Duration::from_millis(5), false);
        let binding = SyncBindingHost::new(config, host.clone());

        assert_eq!(binding.close().await, CloseOutcome::Closed);
        assert_eq!(host.aborts.load(Ordering::SeqCst), 0);
        assert_eq!(binding.close().await, CloseOutcome::AlreadyClosed);
    }

    #[tokio::test]
    async fn test_timeout_then_abort() {
        let config = Arc::new(ProcessConfiguration::new());
        config
            .set_wcf_close_timeout(Duration::from_millis(100))
            .unwrap();
        let host = SlowHost::new(Duration::from_secs(10), false);
        let binding = SyncBindingHost::new(config, host.clone());

        let outcome = binding.close().await;

        assert_eq!(
            outcome,
            CloseOutcome::Aborted(AbortReason::TimedOut(Duration::from_millis(100)))
        );
        assert_eq!(host.aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_close_aborts() {
        let config = Arc::new(ProcessConfiguration::new());
        let host = SlowHost::new(Duration::ZERO, true);
        let binding = SyncBindingHost::new(config, host.clone());

        match binding.close().await {
            CloseOutcome::Aborted(AbortReason::CloseFailed(msg)) => {
                assert!(msg.contains("faulted"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(host.aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_read_at_close_time() {
        let config = Arc::new(ProcessConfiguration::new());
        let host = Arc::new(InProcessChannelHost::new());
        let binding = SyncBindingHost::new(Arc::clone(&config), host.clone());

        // Changed after the host was created, still honoured.
        config.set_wcf_close_timeout(Duration::ZERO).unwrap();

        assert_eq!(
            binding.close().await,
            CloseOutcome::Aborted(AbortReason::ZeroTimeout)
        );
        assert!(host.is_aborted());
        assert!(!host.is_closed());
    }
}
