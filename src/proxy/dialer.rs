//! Outbound connection to the target service

use crate::common::types::TargetAddress;
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Opens one connection to the target per call.
///
/// Implementations need not bound the attempt themselves; the orchestrator
/// applies the per-attempt timeout around every call.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Single connect attempt
    async fn dial(&self, target: &TargetAddress) -> io::Result<Self::Stream>;
}

/// Plain TCP dialer
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, target: &TargetAddress) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((target.host.as_str(), target.port)).await?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY on target stream: {}", e);
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_dialer_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = TcpDialer
            .dial(&TargetAddress::new("127.0.0.1", port))
            .await
            .unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_tcp_dialer_refused() {
        // 一度バインドして解放したポートには誰もいない
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = TcpDialer
            .dial(&TargetAddress::new("127.0.0.1", port))
            .await;
        assert!(result.is_err());
    }
}
