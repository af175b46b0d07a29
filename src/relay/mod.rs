//! The relay engine: one shared UDP listen socket, one independent TCP
//! session per inbound datagram. Sessions run as spawned tasks and reply
//! through the same listen socket; a failed session replies with nothing
//! at all and leaves recovery to the client's own retry logic.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use log::{debug, error};
use tokio::net::UdpSocket;

use crate::addr;
use crate::config::RelayConfig;

mod session;
mod socket;

pub use session::QuerySession;

/// One full ethernet payload minus the IP and UDP headers (1500 - 20 - 8).
/// A DNS query over UDP cannot usefully exceed this without fragmenting.
const DATAGRAM_BUF_SIZE: usize = 1472;

pub struct Relay {
    socket: Arc<UdpSocket>,
    config: RelayConfig,
    sessions: SessionGauge,
}

impl Relay {
    /// Opens the listen socket with the configured options. A failure
    /// here is fatal to startup; everything after it is per-query.
    pub fn bind(config: RelayConfig) -> Result<Self> {
        let socket = socket::bind_udp(&config.listen).with_context(|| {
            format!(
                "failed to open listen socket {}",
                addr::format_endpoint(config.listen.addr)
            )
        })?;
        Ok(Self {
            socket: Arc::new(socket),
            config,
            sessions: SessionGauge::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Number of sessions currently in flight.
    pub fn sessions(&self) -> SessionGauge {
        self.sessions.clone()
    }

    /// Receives one datagram per iteration and spawns a session for it.
    /// The loop never awaits session progress, so a slow upstream cannot
    /// stall ingress; receive errors are logged and the loop continues.
    pub async fn run(self) -> Result<()> {
        let mut buf = [0u8; DATAGRAM_BUF_SIZE];
        loop {
            let (len, client) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    error!("failed to receive datagram: {:#}", err);
                    continue;
                }
            };
            if len == 0 {
                debug!("dropping empty datagram from {}", addr::format_endpoint(client));
                continue;
            }
            debug!(
                "{}b query from {}",
                len,
                addr::format_endpoint(client)
            );
            let query = Bytes::copy_from_slice(&buf[..len]);
            let session = QuerySession::new(client, self.config.upstream, query);
            let socket = self.socket.clone();
            let in_flight = self.sessions.enter();
            tokio::spawn(async move {
                relay_one(socket, session).await;
                drop(in_flight);
            });
            debug!("{} sessions in flight", self.sessions().count());
        }
    }
}

/// Drives one session to its end and delivers the reply, if any. The
/// reply send is fire-and-forget: UDP gives no delivery guarantee and
/// the client owns retries either way.
async fn relay_one(socket: Arc<UdpSocket>, session: QuerySession) {
    let client = session.client();
    match session.resolve().await {
        Ok(response) => {
            debug!(
                "{}b reply to {}",
                response.len(),
                addr::format_endpoint(client)
            );
            if let Err(err) = socket.send_to(&response, client).await {
                debug!(
                    "failed to send reply to {}: {:#}",
                    addr::format_endpoint(client),
                    err
                );
            }
        }
        Err(err) => {
            debug!(
                "dropped query from {}: {:#}",
                addr::format_endpoint(client),
                err
            );
        }
    }
}

/// Live-session counter. Cloning hands out another view of the same
/// count; `enter` returns a guard that holds one unit until dropped.
#[derive(Clone, Default)]
pub struct SessionGauge(Arc<AtomicUsize>);

impl SessionGauge {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn enter(&self) -> InFlight {
        self.0.fetch_add(1, Ordering::Relaxed);
        InFlight(self.0.clone())
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
