use std::net::SocketAddr;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::time::timeout;

use crate::addr;
use crate::config::UpstreamOpts;
use crate::framing;
use crate::relay::socket;

/// One in-flight query: a single UDP datagram relayed over a dedicated
/// TCP connection and back. The connection is dropped when the session
/// ends, whichever way it ends.
pub struct QuerySession {
    client: SocketAddr,
    upstream: UpstreamOpts,
    query: Bytes,
}

impl QuerySession {
    pub fn new(client: SocketAddr, upstream: UpstreamOpts, query: Bytes) -> Self {
        Self {
            client,
            upstream,
            query,
        }
    }

    pub fn client(&self) -> SocketAddr {
        self.client
    }

    /// Runs the session to completion under one absolute deadline
    /// covering connect, send and the full response read.
    pub async fn resolve(self) -> Result<Bytes> {
        timeout(self.upstream.timeout, self.relay())
            .await
            .context("deadline elapsed")?
    }

    async fn relay(&self) -> Result<Bytes> {
        let mut stream = socket::connect_upstream(&self.upstream)
            .await
            .with_context(|| {
                format!(
                    "failed to connect {}",
                    addr::format_endpoint(self.upstream.addr)
                )
            })?;
        framing::write_framed(&mut stream, &self.query)
            .await
            .context("failed to send query")?;
        framing::read_framed(&mut stream)
            .await
            .context("failed to read response")
    }
}
