// ウェイクアップ処理
//
// 停止しているターゲットを起動させるための抽象化：
// - Wake-on-LAN マジックパケット
// - ハイパーバイザAPIによる電源投入
// - 何もしない（常時稼働ターゲット向け）

pub mod noop;
pub mod proxmox;
pub mod wol;

pub use noop::Noop;
pub use proxmox::{HypervisorPowerOn, ProxmoxSettings};
pub use wol::WakeOnLan;

use crate::common::error::{Result, WakeError};
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can make the target reachable.
///
/// Implementations hold only their immutable target description, so one
/// instance is shared by every connection and `wake` may run concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WakeupProvider: Send + Sync {
    /// Signal the target to power on. Success means the signal was
    /// delivered, not that the target is up yet.
    async fn wake(&self) -> std::result::Result<(), WakeError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Wake strategy chosen at startup
#[derive(Debug, Clone)]
pub enum WakeupConfig {
    WakeOnLan { mac: String, broadcast: String },
    HypervisorPowerOn(ProxmoxSettings),
    Noop,
}

impl WakeupConfig {
    pub fn method(&self) -> &'static str {
        match self {
            WakeupConfig::WakeOnLan { .. } => "wol",
            WakeupConfig::HypervisorPowerOn(_) => "proxmox",
            WakeupConfig::Noop => "noop",
        }
    }
}

/// Build the provider selected by `config`
pub fn build_provider(config: &WakeupConfig) -> Result<Arc<dyn WakeupProvider>> {
    let provider: Arc<dyn WakeupProvider> = match config {
        WakeupConfig::WakeOnLan { mac, broadcast } => {
            Arc::new(WakeOnLan::new(mac.clone(), broadcast.clone()))
        }
        WakeupConfig::HypervisorPowerOn(settings) => {
            Arc::new(HypervisorPowerOn::new(settings.clone())?)
        }
        WakeupConfig::Noop => Arc::new(Noop),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::ResourceKind;

    #[test]
    fn test_build_provider_per_method() {
        let wol = WakeupConfig::WakeOnLan {
            mac: "AA:BB:CC:DD:EE:FF".into(),
            broadcast: "255.255.255.255".into(),
        };
        assert_eq!(build_provider(&wol).unwrap().name(), "wol");
        assert_eq!(build_provider(&WakeupConfig::Noop).unwrap().name(), "noop");

        let proxmox = WakeupConfig::HypervisorPowerOn(ProxmoxSettings {
            api_url: "https://pve.lan:8006/api2/json".into(),
            node: "pve1".into(),
            kind: ResourceKind::Container,
            resource_id: "101".into(),
            token: "root@pam!wake=secret".into(),
            insecure: true,
        });
        assert_eq!(build_provider(&proxmox).unwrap().name(), "proxmox");
        assert_eq!(proxmox.method(), "proxmox");
    }
}
