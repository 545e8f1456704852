//! Reconnecting, serialized request/response over a [`Link`]

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use smascale_core::Command;
use smascale_core::constants::{DEFAULT_TIMEOUT, MAX_TIMEOUTS};

use crate::{Link, Transport, error::*};

/// Snapshot of a connection's health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    /// Link is connected
    pub open: bool,

    /// Last connect attempt failed
    pub reconnecting: bool,

    /// Failed exchanges since the last success
    pub consecutive_timeouts: u32,

    /// Failures tolerated before the link is recovered
    pub max_timeouts: u32,
}

/// Mutable part, only touched with the lock held
#[derive(Debug)]
struct Inner<L> {
    link: L,
    reconnecting: bool,
    consecutive_timeouts: u32,
    /// Set while a command is on the wire; still set on the next lock if
    /// the previous exchange was cancelled midway
    in_flight: bool,
    /// A reply timed out and may still arrive
    stale: bool,
}

/// Serialized, self-healing request/response channel
///
/// The link is connected lazily. A failed connect is logged once and retried
/// on the next exchange. After `max_timeouts` consecutive failed exchanges the
/// link is recovered (for sockets: closed) and the next exchange connects
/// afresh.
///
/// The lock is a FIFO-fair [`tokio::sync::Mutex`], so callers are served in
/// arrival order and a dropped caller always releases it.
#[derive(Debug)]
pub struct Connection<L> {
    inner: Mutex<Inner<L>>,
    remote_addr: String,
    connect_timeout: Duration,
    io_timeout: Duration,
    max_timeouts: u32,
}

impl<L: Link> Connection<L> {
    /// Wrap a link, not yet connected
    pub fn new(link: L) -> Self {
        Self {
            remote_addr: link.remote_addr(),
            inner: Mutex::new(Inner {
                link,
                reconnecting: false,
                consecutive_timeouts: 0,
                in_flight: false,
                stale: false,
            }),
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
            max_timeouts: MAX_TIMEOUTS,
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the timeout applied to the write and to the read of each exchange
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set how many consecutive failures are tolerated (at least 1)
    pub fn with_max_timeouts(mut self, max_timeouts: u32) -> Self {
        self.max_timeouts = max_timeouts.max(1);
        self
    }

    /// Current state; waits for any exchange in progress
    pub async fn state(&self) -> ConnectionState {
        let inner = self.inner.lock().await;
        ConnectionState {
            open: inner.link.is_connected(),
            reconnecting: inner.reconnecting,
            consecutive_timeouts: inner.consecutive_timeouts,
            max_timeouts: self.max_timeouts,
        }
    }
}

impl<L: Link> Inner<L> {
    /// Connect unless already connected, logging only on state changes
    async fn ensure_connected(&mut self, remote: &str, limit: Duration) -> Result<()> {
        if self.link.is_connected() {
            return Ok(());
        }

        let result = match timeout(limit, self.link.connect()).await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionTimeout),
        };

        match result {
            Ok(()) => {
                if self.reconnecting {
                    info!("Reconnected to {}", remote);
                }
                self.reconnecting = false;
                self.stale = false;
                Ok(())
            }
            Err(e) => {
                if !self.reconnecting {
                    error!("Connecting to {} failed: {}", remote, e);
                }
                self.reconnecting = true;
                Err(e)
            }
        }
    }

    async fn round_trip(&mut self, command: Command, limit: Duration) -> Result<BytesMut> {
        let data = command.encode();

        timeout(limit, self.link.send(&data))
            .await
            .map_err(|_| Error::WriteTimeout)??;

        timeout(limit, self.link.receive_line())
            .await
            .map_err(|_| Error::ReadTimeout)?
    }

    /// Drop replies to commands that timed out, so they cannot answer the
    /// next one
    async fn discard_stale(&mut self, limit: Duration) -> Result<()> {
        if self.stale {
            self.link.drain(limit).await?;
            self.stale = false;
        }
        Ok(())
    }

    async fn record_failure(&mut self, err: &Error, remote: &str, max_timeouts: u32) {
        self.consecutive_timeouts += 1;
        if err.is_timeout() {
            self.stale = true;
        }

        trace!(
            "Exchange with {} failed ({}/{}): {}",
            remote, self.consecutive_timeouts, max_timeouts, err
        );

        if err.is_disconnect() {
            warn!(
                "{} closed the connection ({}). Are there multiple connections?",
                remote, err
            );
            self.recover(remote).await;
        } else if self.consecutive_timeouts >= max_timeouts {
            error!(
                "Reading from {} failed {} times in a row: {}",
                remote, self.consecutive_timeouts, err
            );
            self.recover(remote).await;
            self.consecutive_timeouts = 0;
        }
    }

    async fn recover(&mut self, remote: &str) {
        if let Err(e) = self.link.recover().await {
            debug!("Recovering link to {} failed: {}", remote, e);
        }
        // A fresh socket owes nothing; a flushed serial line still might
        self.stale &= self.link.is_connected();
    }
}

#[async_trait]
impl<L: Link> Transport for Connection<L> {
    async fn open(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .ensure_connected(&self.remote_addr, self.connect_timeout)
            .await
    }

    async fn exchange(&self, command: Command) -> Option<String> {
        let mut inner = self.inner.lock().await;

        if inner.in_flight {
            debug!(
                "Previous exchange with {} was interrupted, recovering link",
                self.remote_addr
            );
            inner.recover(&self.remote_addr).await;
            inner.in_flight = false;
        }

        inner
            .ensure_connected(&self.remote_addr, self.connect_timeout)
            .await
            .ok()?;

        inner.in_flight = true;
        let result = match inner.discard_stale(self.io_timeout).await {
            Ok(()) => inner.round_trip(command, self.io_timeout).await,
            Err(e) => Err(e),
        };
        inner.in_flight = false;

        match result {
            Ok(line) => {
                inner.consecutive_timeouts = 0;
                Some(String::from_utf8_lossy(&line).into_owned())
            }
            Err(e) => {
                inner
                    .record_failure(&e, &self.remote_addr, self.max_timeouts)
                    .await;
                None
            }
        }
    }

    async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Err(e) = inner.link.disconnect().await {
            debug!("Closing {} failed: {}", self.remote_addr, e);
        }
        inner.in_flight = false;
        inner.reconnecting = false;
        inner.stale = false;
    }

    fn remote_addr(&self) -> String {
        self.remote_addr.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mock::MockScale;
    use pretty_assertions::assert_eq;

    const FRAME: &str = "N     +   0.1234 g  \r\n";

    #[tokio::test]
    async fn test_exchange_returns_line() {
        let scale = MockScale::new();
        let conn = Connection::new(scale.clone());

        let line = conn.exchange(Command::ReadWeight).await;
        assert_eq!(line.as_deref(), Some(FRAME));

        let state = conn.state().await;
        assert!(state.open);
        assert!(!state.reconnecting);
        assert_eq!(state.consecutive_timeouts, 0);
        assert_eq!(state.max_timeouts, MAX_TIMEOUTS);
        assert_eq!(scale.connects(), 1);
    }

    #[tokio::test]
    async fn test_offline_device_returns_none_and_recovers() {
        let scale = MockScale::new();
        scale.set_online(false);
        let conn = Connection::new(scale.clone());

        assert_eq!(conn.exchange(Command::ReadWeight).await, None);
        assert_eq!(conn.exchange(Command::ReadWeight).await, None);

        let state = conn.state().await;
        assert!(!state.open);
        assert!(state.reconnecting);
        assert!(scale.exchanges().is_empty());

        scale.set_online(true);
        assert_eq!(
            conn.exchange(Command::ReadWeight).await.as_deref(),
            Some(FRAME)
        );
        assert!(!conn.state().await.reconnecting);
    }

    #[tokio::test]
    async fn test_open_reports_failure() {
        let scale = MockScale::new();
        scale.set_online(false);
        let conn = Connection::new(scale.clone());

        assert!(conn.open().await.is_err());
        assert!(conn.state().await.reconnecting);

        scale.set_online(true);
        conn.open().await.unwrap();
        assert!(conn.state().await.open);
        assert_eq!(scale.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_below_threshold_keep_link() {
        let scale = MockScale::new();
        scale.set_silent(true);
        let conn = Connection::new(scale.clone());

        for _ in 0..MAX_TIMEOUTS - 1 {
            assert_eq!(conn.exchange(Command::ReadWeight).await, None);
        }

        let state = conn.state().await;
        assert!(state.open);
        assert_eq!(state.consecutive_timeouts, MAX_TIMEOUTS - 1);
        assert_eq!(scale.connects(), 1);

        scale.set_silent(false);
        assert!(conn.exchange(Command::ReadWeight).await.is_some());
        assert_eq!(conn.state().await.consecutive_timeouts, 0);
        assert_eq!(scale.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_forces_fresh_connect() {
        let scale = MockScale::new();
        scale.set_silent(true);
        let conn = Connection::new(scale.clone());

        for _ in 0..MAX_TIMEOUTS {
            assert_eq!(conn.exchange(Command::ReadWeight).await, None);
        }

        let state = conn.state().await;
        assert!(!state.open);
        assert_eq!(state.consecutive_timeouts, 0);

        scale.set_silent(false);
        assert_eq!(
            conn.exchange(Command::ReadWeight).await.as_deref(),
            Some(FRAME)
        );
        assert_eq!(scale.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_threshold() {
        let scale = MockScale::new();
        scale.set_silent(true);
        let conn = Connection::new(scale.clone()).with_max_timeouts(2);

        conn.exchange(Command::ReadWeight).await;
        assert!(conn.state().await.open);
        conn.exchange(Command::ReadWeight).await;
        assert!(!conn.state().await.open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_exchange_releases_lock_and_resets_link() {
        let scale = MockScale::new();
        scale.set_silent(true);
        let conn = Connection::new(scale.clone()).with_io_timeout(Duration::from_secs(5));

        let cancelled = timeout(
            Duration::from_millis(100),
            conn.exchange(Command::QueryModel),
        )
        .await;
        assert!(cancelled.is_err());

        scale.set_silent(false);
        let line = conn.exchange(Command::ReadWeight).await;
        assert_eq!(line.as_deref(), Some(FRAME));

        // The interrupted link was dropped and replaced
        assert_eq!(scale.connects(), 2);
        assert!(!scale.interleaved());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_is_not_paired_with_next_command() {
        let scale = MockScale::new().with_latency(Duration::from_millis(800));
        let conn = Connection::new(scale.clone());

        assert_eq!(conn.exchange(Command::QueryModel).await, None);
        assert_eq!(conn.state().await.consecutive_timeouts, 1);

        scale.set_latency(Duration::ZERO);
        let line = conn.exchange(Command::ReadWeight).await;
        assert_eq!(line.as_deref(), Some(FRAME));

        // Link kept, the late model reply never surfaced
        assert_eq!(scale.connects(), 1);
        assert!(!scale.interleaved());
        assert_eq!(scale.exchanges(), vec![(Command::ReadWeight, FRAME.to_string())]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let scale = MockScale::new();
        let conn = Connection::new(scale.clone());

        conn.close().await;
        conn.exchange(Command::Tare).await.unwrap();
        conn.close().await;
        conn.close().await;

        assert!(!conn.state().await.open);
        assert!(!scale.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_exchanges_never_interleave() {
        let scale = MockScale::new().with_latency(Duration::from_millis(5));
        let conn = Arc::new(Connection::new(scale.clone()));

        let mut handles = Vec::new();
        for i in 0..40 {
            let conn = conn.clone();
            let command = Command::ALL[i % Command::ALL.len()];
            handles.push(tokio::spawn(async move {
                (command, conn.exchange(command).await)
            }));
        }

        for handle in handles {
            let (command, line) = handle.await.unwrap();
            assert_eq!(line, Some(scale.response_for(command)));
        }

        assert!(!scale.interleaved());
        assert_eq!(scale.exchanges().len(), 40);
        assert_eq!(scale.connects(), 1);
    }
}
