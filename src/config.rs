use std::net::SocketAddr;
use std::time::Duration;

/// Hard cap on the lifetime of a single query session, covering connect,
/// send and the full response read.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen: ListenOpts,
    pub upstream: UpstreamOpts,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenOpts {
    pub addr: SocketAddr,
    pub reuse_port: bool,
    pub ipv6_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamOpts {
    pub addr: SocketAddr,
    pub syn_retries: Option<u8>,
    pub quick_ack: bool,
    pub fast_open: bool,
    pub timeout: Duration,
}
