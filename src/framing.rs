//! DNS-over-TCP framing: every message on the TCP leg is prefixed with a
//! 2-byte big-endian length giving the byte count of the message that
//! follows (RFC 1035 §4.2.2). The framing is identical for the query sent
//! upstream and the response read back.

use anyhow::{bail, ensure, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

const PREFIX_LEN: usize = 2;

/// Prepends the length prefix. The payload must be non-empty and fit the
/// prefix; both bounds are enforced where datagrams enter the relay.
pub fn encode(payload: &[u8]) -> Bytes {
    debug_assert!(!payload.is_empty());
    debug_assert!(payload.len() <= MAX_MESSAGE_SIZE);
    let mut framed = BytesMut::with_capacity(PREFIX_LEN + payload.len());
    framed.put_u16(payload.len() as u16);
    framed.put_slice(payload);
    framed.freeze()
}

/// Returns the declared payload length once both prefix bytes have
/// accumulated, `None` while the header is still incomplete.
pub fn decode_prefix(buf: &[u8]) -> Option<u16> {
    let prefix = buf.first_chunk::<PREFIX_LEN>()?;
    Some(u16::from_be_bytes(*prefix))
}

/// The payload is complete exactly when the declared byte count has been
/// received; anything past it is a protocol violation.
pub fn is_message_complete(received: usize, expected: u16) -> bool {
    received == usize::from(expected)
}

/// Writes one framed message. Partial writes are resumed, not restarted,
/// so the prefix is emitted exactly once per message.
pub async fn write_framed<S>(stream: &mut S, payload: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&encode(payload)).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one framed message, accumulating across however many partial
/// reads the transport produces, and returns exactly the declared payload.
pub async fn read_framed<S>(stream: &mut S) -> Result<Bytes>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(512);
    let expected = loop {
        match decode_prefix(&buf) {
            Some(expected) => break expected,
            None => {
                if stream.read_buf(&mut buf).await? == 0 {
                    bail!("connection closed before the length prefix arrived");
                }
            }
        }
    };
    ensure!(expected > 0, "peer declared a zero-length message");

    buf.advance(PREFIX_LEN);
    buf.reserve(usize::from(expected).saturating_sub(buf.len()));
    while buf.len() < usize::from(expected) {
        if stream.read_buf(&mut buf).await? == 0 {
            bail!(
                "connection closed after {} of {} message bytes",
                buf.len(),
                expected
            );
        }
    }
    ensure!(
        is_message_complete(buf.len(), expected),
        "peer sent {} bytes past the declared length of {}",
        buf.len() - usize::from(expected),
        expected
    );
    Ok(buf.freeze())
}
