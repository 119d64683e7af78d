// 接続ライフサイクル管理
//
// 1接続ごとに WAKING -> CONNECTING -> RELAYING -> CLOSED を順に実行する。
// WAKING / CONNECTING で失敗した場合は ABORTED となりクライアントを閉じる。

use crate::common::error::{ConnectError, Error};
use crate::common::types::{RetryPolicy, TargetAddress};
use crate::proxy::dialer::{Dialer, TcpDialer};
use crate::proxy::relay::{relay, RelayStats};
use crate::wakeup::WakeupProvider;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Lifecycle state of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Waking,
    Connecting,
    Relaying,
    Closed,
    Aborted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Waking => write!(f, "WAKING"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Relaying => write!(f, "RELAYING"),
            ConnectionState::Closed => write!(f, "CLOSED"),
            ConnectionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// How a connection ended
#[derive(Debug)]
pub enum ConnectionOutcome {
    /// The relay ran and both streams are closed
    Closed { attempts: u32, stats: RelayStats },
    /// The lifecycle stopped in `stage`; the client was closed without data
    Aborted { stage: ConnectionState, error: Error },
}

impl ConnectionOutcome {
    pub fn state(&self) -> ConnectionState {
        match self {
            ConnectionOutcome::Closed { .. } => ConnectionState::Closed,
            ConnectionOutcome::Aborted { .. } => ConnectionState::Aborted,
        }
    }
}

/// Drives the wake -> retry-connect -> relay sequence for accepted clients.
///
/// Holds only immutable configuration, so one instance behind an `Arc`
/// serves every connection.
pub struct Orchestrator<D: Dialer = TcpDialer> {
    target: TargetAddress,
    retry: RetryPolicy,
    wakeup: Arc<dyn WakeupProvider>,
    dialer: D,
}

impl Orchestrator<TcpDialer> {
    pub fn new(target: TargetAddress, retry: RetryPolicy, wakeup: Arc<dyn WakeupProvider>) -> Self {
        Self::with_dialer(target, retry, wakeup, TcpDialer)
    }
}

impl<D: Dialer> Orchestrator<D> {
    pub fn with_dialer(
        target: TargetAddress,
        retry: RetryPolicy,
        wakeup: Arc<dyn WakeupProvider>,
        dialer: D,
    ) -> Self {
        Self {
            target,
            retry,
            wakeup,
            dialer,
        }
    }

    pub fn target(&self) -> &TargetAddress {
        &self.target
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run the full lifecycle for one accepted client.
    ///
    /// Consumes `client`; it is closed on every path before this returns.
    pub async fn handle<S>(&self, client: S) -> ConnectionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        debug!("State {}: invoking {} provider", ConnectionState::Waking, self.wakeup.name());
        if let Err(e) = self.wakeup.wake().await {
            warn!("Wakeup via {} failed: {}. Closing client connection", self.wakeup.name(), e);
            drop(client);
            return ConnectionOutcome::Aborted {
                stage: ConnectionState::Waking,
                error: e.into(),
            };
        }

        debug!("State {}: dialing {}", ConnectionState::Connecting, self.target);
        let (target, attempts) = match self.connect().await {
            Ok(connected) => connected,
            Err(e) => {
                warn!(
                    "Could not connect to target {}: {}. Closing client connection",
                    self.target, e
                );
                drop(client);
                return ConnectionOutcome::Aborted {
                    stage: ConnectionState::Connecting,
                    error: e.into(),
                };
            }
        };

        info!("State {}: relaying to {}", ConnectionState::Relaying, self.target);
        let stats = relay(client, target).await;

        info!(
            "State {}: {} bytes to target, {} bytes to client",
            ConnectionState::Closed,
            stats.client_to_target,
            stats.target_to_client
        );
        ConnectionOutcome::Closed { attempts, stats }
    }

    /// Connect to the target, retrying with a fixed delay.
    ///
    /// The delay is both the per-attempt timeout and the pause after a
    /// failed attempt; there is no pause before the first attempt or after
    /// the last one. Returns the stream and the attempt it succeeded on.
    pub async fn connect(&self) -> Result<(D::Stream, u32), ConnectError> {
        let max = self.retry.max_attempts.max(1);
        let delay = self.retry.delay;

        let mut attempt = 1;
        loop {
            match self.dial_once(delay).await {
                Ok(stream) => {
                    info!("Connected to target {} on attempt {}", self.target, attempt);
                    return Ok((stream, attempt));
                }
                Err(e) if attempt >= max => {
                    return Err(ConnectError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} to connect to {} failed: {}. Retrying in {:?}",
                        attempt, max, self.target, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One dial bounded by `limit`. A zero limit waits for the dialer.
    async fn dial_once(&self, limit: Duration) -> io::Result<D::Stream> {
        if limit.is_zero() {
            return self.dialer.dial(&self.target).await;
        }
        match tokio::time::timeout(limit, self.dialer.dial(&self.target)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {} timed out after {:?}", self.target, limit),
            )),
        }
    }
}
