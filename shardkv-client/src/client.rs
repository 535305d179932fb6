//! Minimal client: one TCP connection, one read per reply.
//!
//! Matches the server's framing (§4.J): a request is one discrete write, a
//! reply is whatever bytes come back on the next read. No retry, no
//! reconnect.

use crate::error::ClientError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

pub struct Client {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            buf: vec![0u8; 8192],
        })
    }

    /// Sends `line` (newline-terminated) as one request and returns the
    /// server's reply with trailing newlines stripped.
    pub async fn send_line(&mut self, line: &str) -> Result<String, ClientError> {
        let mut request = line.to_string();
        if !request.ends_with('\n') {
            request.push('\n');
        }
        self.stream.write_all(request.as_bytes()).await?;

        let n = self.stream.read(&mut self.buf).await?;
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(String::from_utf8_lossy(&self.buf[..n])
            .trim_end_matches(['\n', '\r'])
            .to_string())
    }
}
