//! UDP transport implementation for the NSM client.
//!
//! OSC packets over a connected UDP socket. Encoding and decoding is
//! delegated to `rosc`; bundles are flattened into their messages.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rosc::{OscMessage, OscPacket, OscType};
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex as TokioMutex};

use super::{BoxFuture, Connector, Transport};
use crate::config::ServerAddress;
use crate::error::{NsmError, Result};
use crate::protocol::{Arg, Message};

/// Largest datagram we accept
const RECV_BUFFER_SIZE: usize = 65_536;

/// OSC over UDP transport.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    server: SocketAddr,
    connected: AtomicBool,
    shutdown: watch::Sender<bool>,
    /// Messages left over from a bundle
    backlog: Mutex<VecDeque<Message>>,
    /// Datagram buffer, reused across receives
    recv_buf: TokioMutex<Vec<u8>>,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `server`.
    pub async fn connect(server: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if server.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| NsmError::Connection(format!("Failed to bind UDP socket: {e}")))?;
        socket
            .connect(server)
            .await
            .map_err(|e| NsmError::Connection(format!("Failed to connect to {server}: {e}")))?;

        tracing::debug!(
            "UDP transport bound to {:?}, server {}",
            socket.local_addr().ok(),
            server
        );

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            socket,
            server,
            connected: AtomicBool::new(true),
            shutdown,
            backlog: Mutex::new(VecDeque::new()),
            recv_buf: TokioMutex::new(vec![0u8; RECV_BUFFER_SIZE]),
        })
    }

    /// Local address of the socket
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Server address this transport sends to
    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }
}

impl Transport for UdpTransport {
    fn send(&self, msg: Message) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if *self.shutdown.borrow() {
                return Err(NsmError::Connection("transport closed".to_string()));
            }
            let bytes = encode(msg)?;
            self.socket.send(&bytes).await?;
            Ok(())
        })
    }

    fn recv(&self) -> BoxFuture<'_, Result<Option<Message>>> {
        Box::pin(async move {
            let mut shutdown = self.shutdown.subscribe();
            let mut buf = self.recv_buf.lock().await;

            loop {
                if *shutdown.borrow_and_update() {
                    return Ok(None);
                }
                if let Some(msg) = self.backlog.lock().pop_front() {
                    return Ok(Some(msg));
                }

                let len = tokio::select! {
                    _ = shutdown.changed() => continue,
                    received = self.socket.recv(&mut buf) => received.map_err(|e| {
                        NsmError::Transport(format!("UDP receive failed: {e}"))
                    })?,
                };

                let packet = match rosc::decoder::decode_udp(&buf[..len]) {
                    Ok((_, packet)) => packet,
                    Err(e) => {
                        tracing::debug!("Dropping undecodable datagram: {:?}", e);
                        continue;
                    },
                };

                let mut messages = VecDeque::new();
                flatten(packet, &mut messages);
                if let Some(first) = messages.pop_front() {
                    self.backlog.lock().extend(messages);
                    return Ok(Some(first));
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.shutdown.send_replace(true);
    }

    fn name(&self) -> &'static str {
        "OSC/UDP"
    }
}

/// Connector producing [`UdpTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    fn open(&self, address: ServerAddress) -> BoxFuture<'_, Result<Arc<dyn Transport>>> {
        Box::pin(async move {
            let server = address.resolve().await?;
            let transport = UdpTransport::connect(server).await?;
            tracing::debug!("Opened UDP transport to {}", transport.server_addr());
            Ok(Arc::new(transport) as Arc<dyn Transport>)
        })
    }
}

fn encode(msg: Message) -> Result<Vec<u8>> {
    let args = msg
        .args
        .into_iter()
        .map(|arg| match arg {
            Arg::Str(s) => OscType::String(s),
            Arg::Int(i) => OscType::Int(i),
            Arg::Float(f) => OscType::Float(f),
        })
        .collect();

    let packet = OscPacket::Message(OscMessage {
        addr: msg.address,
        args,
    });
    Ok(rosc::encoder::encode(&packet)?)
}

fn flatten(packet: OscPacket, out: &mut VecDeque<Message>) {
    match packet {
        OscPacket::Message(osc) => match convert(osc) {
            Some(msg) => out.push_back(msg),
            None => tracing::debug!("Dropping message with unsupported argument types"),
        },
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        },
    }
}

fn convert(osc: OscMessage) -> Option<Message> {
    let args = osc
        .args
        .into_iter()
        .map(|arg| match arg {
            OscType::String(s) => Some(Arg::Str(s)),
            OscType::Int(i) => Some(Arg::Int(i)),
            OscType::Float(f) => Some(Arg::Float(f)),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Message {
        address: osc.addr,
        args,
    })
}
