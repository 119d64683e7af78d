// TCPリレー本体
//
// Acceptor -> (接続ごと) Orchestrator -> WakeupProvider -> 再接続ループ -> Relay

pub mod acceptor;
pub mod dialer;
pub mod orchestrator;
pub mod relay;

pub use acceptor::Acceptor;
pub use dialer::{Dialer, TcpDialer};
pub use orchestrator::{ConnectionOutcome, ConnectionState, Orchestrator};
pub use relay::{relay, RelayStats};
