//! Reads one length-framed replication message off a socket, accumulating
//! partial reads until a complete frame is available.

use crate::ServerError;
use bytes::{Buf, Bytes, BytesMut};
use shardkv_protocol::ProtocolError;
use tokio::io::AsyncReadExt;

/// Returns `Ok(None)` on a clean EOF with no partial frame pending.
pub async fn read_message<R, T>(
    stream: &mut R,
    acc: &mut BytesMut,
    decode: impl Fn(&mut Bytes) -> Result<Option<T>, ProtocolError>,
) -> Result<Option<T>, ServerError>
where
    R: AsyncReadExt + Unpin,
{
    let mut read_buf = [0u8; 8192];
    loop {
        // `decode` consumes from the front of a `Bytes` on success; try it
        // against a snapshot so a partial frame leaves `acc` untouched.
        let mut attempt = acc.clone().freeze();
        match decode(&mut attempt) {
            Ok(Some(msg)) => {
                let consumed = acc.len() - attempt.len();
                acc.advance(consumed);
                return Ok(Some(msg));
            }
            Ok(None) => {}
            Err(err) => return Err(ServerError::Protocol(err)),
        }

        let n = stream.read(&mut read_buf).await?;
        if n == 0 {
            return Ok(None);
        }
        acc.extend_from_slice(&read_buf[..n]);
    }
}
