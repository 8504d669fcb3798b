//! UDP-backed transports and a stdout host bridge for the client binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::transport::{
    BridgeEnvelope, ControlChannel, GamepadChanged, HostBridge, InputTransport, TransportEvent,
};

const MAX_DATAGRAM: usize = 2048;

/// Data channel over a connected peer address. Sends never block; a full
/// socket buffer surfaces as a send failure.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

impl InputTransport for UdpTransport {
    fn send(&mut self, payload: Bytes) -> Result<()> {
        self.socket
            .try_send_to(&payload, self.peer)
            .with_context(|| format!("sending {} bytes to {}", payload.len(), self.peer))?;
        Ok(())
    }
}

/// Control channel carrying hot-plug JSON. Closed when no peer is configured.
pub struct UdpControlChannel {
    socket: Arc<UdpSocket>,
    peer: Option<SocketAddr>,
}

impl UdpControlChannel {
    pub fn new(socket: Arc<UdpSocket>, peer: Option<SocketAddr>) -> Self {
        Self { socket, peer }
    }

    fn send(&self, message: GamepadChanged) -> Result<()> {
        let Some(peer) = self.peer else {
            anyhow::bail!("control channel has no peer");
        };
        let json = message.to_json()?;
        self.socket
            .try_send_to(json.as_bytes(), peer)
            .with_context(|| format!("sending control message to {peer}"))?;
        Ok(())
    }
}

impl ControlChannel for UdpControlChannel {
    fn is_open(&self) -> bool {
        self.peer.is_some()
    }

    fn send_gamepad_added(&mut self, index: u8) -> Result<()> {
        self.send(GamepadChanged::new(index, true))
    }

    fn send_gamepad_removed(&mut self, index: u8) -> Result<()> {
        self.send(GamepadChanged::new(index, false))
    }
}

/// Writes each envelope as one JSON line on stdout.
#[derive(Debug, Default)]
pub struct StdoutBridge;

impl HostBridge for StdoutBridge {
    fn post(&mut self, envelope: &BridgeEnvelope) -> Result<()> {
        println!("{}", envelope.to_json()?);
        Ok(())
    }
}

/// Forward datagrams from `peer` as transport messages until the socket
/// fails or the session stops listening.
pub fn spawn_reader(
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    events: mpsc::Sender<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    warn!("socket receive failed: {err}");
                    let _ = events.send(TransportEvent::Error(err.to_string())).await;
                    return;
                }
            };
            if from != peer {
                debug!("ignoring {len} bytes from {from}");
                continue;
            }
            let payload = Bytes::copy_from_slice(&buf[..len]);
            if events.send(TransportEvent::Message(payload)).await.is_err() {
                return;
            }
        }
    })
}
