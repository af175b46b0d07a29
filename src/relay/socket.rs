use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpSocket, TcpStream, UdpSocket};

use crate::addr;
use crate::config::{ListenOpts, UpstreamOpts};

/// Binds the UDP listener, applying the requested socket options before
/// the bind so they take effect for it.
pub fn bind_udp(opts: &ListenOpts) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(opts.addr), Type::DGRAM, Some(Protocol::UDP))
        .context("failed to create udp socket")?;
    if opts.ipv6_only && opts.addr.is_ipv6() {
        socket
            .set_only_v6(true)
            .context("failed to enable IPV6_V6ONLY")?;
    }
    if opts.reuse_port {
        set_reuse_port(&socket)?;
    }
    socket.set_nonblocking(true)?;
    socket
        .bind(&opts.addr.into())
        .with_context(|| format!("failed to bind udp {}", addr::format_endpoint(opts.addr)))?;
    UdpSocket::from_std(socket.into()).context("failed to register udp socket with the reactor")
}

/// Connects to the upstream resolver. Connect-time tuning options go on
/// before the handshake starts; TCP_NODELAY goes on right after so the
/// single framed query is never held back.
pub async fn connect_upstream(opts: &UpstreamOpts) -> Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(opts.addr), Type::STREAM, Some(Protocol::TCP))
        .context("failed to create tcp socket")?;
    socket.set_nonblocking(true)?;
    apply_tcp_tuning(&socket, opts)?;
    let stream = TcpSocket::from_std_stream(socket.into())
        .connect(opts.addr)
        .await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(unix)]
fn set_reuse_port(socket: &Socket) -> Result<()> {
    socket
        .set_reuse_port(true)
        .context("failed to enable SO_REUSEPORT")
}

#[cfg(not(unix))]
fn set_reuse_port(_socket: &Socket) -> Result<()> {
    anyhow::bail!("SO_REUSEPORT is not supported on this platform")
}

#[cfg(target_os = "linux")]
fn apply_tcp_tuning(socket: &Socket, opts: &UpstreamOpts) -> Result<()> {
    if let Some(count) = opts.syn_retries {
        set_tcp_option(socket, libc::TCP_SYNCNT, i32::from(count))
            .context("failed to set TCP_SYNCNT")?;
    }
    if opts.quick_ack {
        set_tcp_option(socket, libc::TCP_QUICKACK, 1).context("failed to set TCP_QUICKACK")?;
    }
    if opts.fast_open {
        set_tcp_option(socket, libc::TCP_FASTOPEN_CONNECT, 1)
            .context("failed to set TCP_FASTOPEN_CONNECT")?;
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn apply_tcp_tuning(_socket: &Socket, opts: &UpstreamOpts) -> Result<()> {
    anyhow::ensure!(
        opts.syn_retries.is_none() && !opts.quick_ack && !opts.fast_open,
        "TCP_SYNCNT, TCP_QUICKACK and TCP_FASTOPEN are linux-only options"
    );
    Ok(())
}

#[cfg(target_os = "linux")]
fn set_tcp_option(socket: &Socket, option: libc::c_int, value: libc::c_int) -> Result<()> {
    use std::os::fd::AsRawFd;

    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_TCP,
            option,
            &value as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}
