// 待ち受けループ
//
// 接続ごとにタスクを起動してOrchestratorに渡す。acceptエラーは記録し、少し待ってから継続する。

use crate::common::error::{Error, Result};
use crate::common::types::ConnectionId;
use crate::proxy::dialer::Dialer;
use crate::proxy::orchestrator::{ConnectionOutcome, Orchestrator};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, info, info_span, warn, Instrument};

/// Pause after a failed accept (e.g. out of file descriptors)
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Retry `accept` until it yields a connection, backing off after each error.
async fn accept_with_backoff<T, F, Fut>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

pub struct Acceptor {
    listener: TcpListener,
    limit: Option<Arc<Semaphore>>,
}

impl Acceptor {
    /// Bind the listening socket. Failure here is fatal for the process.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::bind(addr, e))?;
        Ok(Self {
            listener,
            limit: None,
        })
    }

    /// Cap the number of in-flight connections. `None` leaves it unbounded.
    pub fn with_connection_limit(mut self, max_connections: Option<usize>) -> Self {
        self.limit = max_connections.map(|max| Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one task per connection.
    pub async fn run<D: Dialer>(self, orchestrator: Arc<Orchestrator<D>>) {
        debug!("Accept loop started");

        loop {
            let permit = match &self.limit {
                Some(limit) => match limit.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            let (stream, peer) = accept_with_backoff(|| self.listener.accept()).await;

            if let Err(e) = stream.set_nodelay(true) {
                debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
            }

            let id = ConnectionId::new();
            let span = info_span!("connection", %id, %peer);
            let orchestrator = Arc::clone(&orchestrator);

            tokio::spawn(
                async move {
                    let _permit = permit;
                    info!("Accepted connection from {}", peer);
                    match orchestrator.handle(stream).await {
                        ConnectionOutcome::Closed { attempts, stats } => {
                            info!("Connection closed after {} connect attempt(s), {} bytes relayed", attempts, stats.total());
                        }
                        ConnectionOutcome::Aborted { stage, error } => {
                            info!("Connection aborted during {}: {}", stage, error);
                        }
                    }
                }
                .instrument(span),
            );
        }
    }
}
