// 双方向リレー
//
// 各方向は送信元がEOFかエラーになるまでコピーし、終了時に宛先の書き込み側を閉じる。
// 先に終わった方向がEOFなら、反対方向は DRAIN_TIMEOUT だけ残りを流してから打ち切る。
// エラーなら即座に打ち切る。戻る時点で両ストリームとも閉じられる。

use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

const BUFFER_SIZE: usize = 16 * 1024;

/// How long the opposite direction may keep flowing after the first one ends
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Bytes moved in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_target: u64,
    pub target_to_client: u64,
}

impl RelayStats {
    pub fn total(&self) -> u64 {
        self.client_to_target + self.target_to_client
    }
}

enum Finished {
    Upstream(io::Result<()>),
    Downstream(io::Result<()>),
}

/// How one direction ended
enum DirectionEnd {
    Completed(io::Result<()>),
    /// Stopped because the opposite direction ended first
    Cancelled,
}

/// Copy until the source ends, then close the destination on every exit path.
async fn pipe<R, W>(reader: &mut R, writer: &mut W, transferred: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let result = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(e),
        };
        if let Err(e) = writer.write_all(&buf[..n]).await {
            break Err(e);
        }
        *transferred += n as u64;
    };

    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of relay destination failed: {}", e);
    }
    result
}

/// After the first direction has ended, let `rest` finish what is already in
/// flight for at most `DRAIN_TIMEOUT`. An error on the first direction
/// cancels `rest` immediately.
async fn finish_opposite<F>(first: &io::Result<()>, rest: F) -> DirectionEnd
where
    F: std::future::Future<Output = io::Result<()>>,
{
    if first.is_err() {
        return DirectionEnd::Cancelled;
    }
    match tokio::time::timeout(DRAIN_TIMEOUT, rest).await {
        Ok(result) => DirectionEnd::Completed(result),
        Err(_) => DirectionEnd::Cancelled,
    }
}

fn log_end(direction: &str, end: &DirectionEnd) {
    match end {
        DirectionEnd::Completed(Ok(())) => {}
        DirectionEnd::Completed(Err(e)) => warn!("{} ended with error: {}", direction, e),
        DirectionEnd::Cancelled => debug!("{} stopped after the opposite direction ended", direction),
    }
}

/// Relay bytes between `client` and `target` until one direction ends.
///
/// Returns without waiting for the opposite peer to close; both streams are
/// dropped (fully closed) when this returns.
pub async fn relay<C, T>(client: C, target: T) -> RelayStats
where
    C: AsyncRead + AsyncWrite + Unpin + Send,
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut target_rd, mut target_wr) = tokio::io::split(target);
    let mut stats = RelayStats::default();

    let (upstream, downstream) = {
        let up = pipe(&mut client_rd, &mut target_wr, &mut stats.client_to_target);
        let down = pipe(&mut target_rd, &mut client_wr, &mut stats.target_to_client);
        tokio::pin!(up);
        tokio::pin!(down);

        let first = tokio::select! {
            result = &mut up => Finished::Upstream(result),
            result = &mut down => Finished::Downstream(result),
        };

        match first {
            Finished::Upstream(result) => {
                let rest = finish_opposite(&result, &mut down).await;
                (DirectionEnd::Completed(result), rest)
            }
            Finished::Downstream(result) => {
                let rest = finish_opposite(&result, &mut up).await;
                (rest, DirectionEnd::Completed(result))
            }
        }
    };

    log_end("client -> target", &upstream);
    log_end("target -> client", &downstream);
    debug!(
        "Relay finished: {} bytes client -> target, {} bytes target -> client",
        stats.client_to_target, stats.target_to_client
    );

    drop((client_rd, client_wr, target_rd, target_wr));
    stats
}
