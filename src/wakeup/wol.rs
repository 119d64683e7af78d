// Wake-on-LAN
//
// 0xFF x6 + MACアドレス x16 = 102バイトのマジックパケットをUDPブロードキャストで送信

use super::WakeupProvider;
use crate::common::error::WakeError;
use crate::common::types::MacAddress;
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::UdpSocket;
use tracing::info;

/// Discard port conventionally used for magic packets
pub const WOL_PORT: u16 = 9;

/// Total size of a magic packet
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// Build the magic packet for `mac`
pub fn magic_packet(mac: &MacAddress) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.octets());
    }
    packet
}

/// Sends a magic packet to the broadcast address on every wake
#[derive(Debug, Clone)]
pub struct WakeOnLan {
    mac: String,
    broadcast: String,
    port: u16,
}

impl WakeOnLan {
    pub fn new(mac: impl Into<String>, broadcast: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            broadcast: broadcast.into(),
            port: WOL_PORT,
        }
    }

    /// Override the destination port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn destination(&self) -> Result<SocketAddrV4, WakeError> {
        let ip: Ipv4Addr = self.broadcast.parse().map_err(|_| {
            WakeError::InvalidAddress(format!("Invalid broadcast address: {}", self.broadcast))
        })?;
        Ok(SocketAddrV4::new(ip, self.port))
    }
}

#[async_trait]
impl WakeupProvider for WakeOnLan {
    async fn wake(&self) -> Result<(), WakeError> {
        let mac: MacAddress = self.mac.parse().map_err(WakeError::InvalidAddress)?;
        let destination = self.destination()?;
        let packet = magic_packet(&mac);

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        let sent = socket.send_to(&packet, destination).await?;

        info!(
            "Sent {} byte Wake-on-LAN packet to {} for MAC {}",
            sent, destination, mac
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "wol"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_magic_packet_layout() {
        let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let packet = magic_packet(&mac);

        assert_eq!(packet.len(), 102);
        assert!(packet[..6].iter().all(|b| *b == 0xFF));
        for k in 0..16 {
            assert_eq!(&packet[6 + 6 * k..12 + 6 * k], &mac.octets()[..], "repetition {}", k);
        }
    }

    #[tokio::test]
    async fn test_wake_sends_packet() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let provider = WakeOnLan::new("01:23:45:67:89:ab", "127.0.0.1").with_port(port);
        provider.wake().await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("no packet received")
            .unwrap();
        assert_eq!(len, MAGIC_PACKET_LEN);
        assert_eq!(&buf[6..12], &[0x01, 0x23, 0x45, 0x67, 0x89, 0xab]);
    }

    #[tokio::test]
    async fn test_invalid_mac_sends_nothing() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let provider = WakeOnLan::new("not-a-mac", "127.0.0.1").with_port(port);
        let err = provider.wake().await.unwrap_err();
        assert!(matches!(err, WakeError::InvalidAddress(_)));

        let mut buf = [0u8; 256];
        let received =
            tokio::time::timeout(Duration::from_millis(200), receiver.recv_from(&mut buf)).await;
        assert!(received.is_err(), "a packet was sent for an invalid MAC");
    }

    #[tokio::test]
    async fn test_invalid_broadcast_address() {
        let provider = WakeOnLan::new("AA:BB:CC:DD:EE:FF", "not-an-ip");
        let err = provider.wake().await.unwrap_err();
        assert!(matches!(err, WakeError::InvalidAddress(_)));
    }
}
