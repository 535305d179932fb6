//! WAL record encoding: a `Request` is `{ command, args }` plus, for
//! producers, a one-shot ack channel signaled once the batch containing it
//! has been durably written (or has failed).
//!
//! On disk, a Request is a length-prefixed binary frame with a trailing
//! CRC32C over the payload, so a segment's bytes are simply a
//! concatenation of frames read sequentially until EOF.

use crate::error::WalError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

/// The mutating commands a Request can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Set,
    Del,
}

impl Command {
    fn as_u8(self) -> u8 {
        match self {
            Command::Set => 1,
            Command::Del => 2,
        }
    }

    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Command::Set),
            2 => Some(Command::Del),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Set => "SET",
            Command::Del => "DEL",
        }
    }
}

/// A single WAL-bound mutation plus its (optional) one-shot ack channel.
///
/// The ack channel is a plain field on the value the producer constructs
/// and holds locally for the duration of the call — never a shared struct
/// field read back out from elsewhere, which is what the original source
/// did and raced under concurrent callers.
pub struct Request {
    pub command: Command,
    pub args: Vec<String>,
    pub ack: Option<SyncSender<Result<(), WalError>>>,
}

impl Request {
    /// Builds a Request together with a fresh, single-shot ack channel
    /// held locally by the caller for the lifetime of this one call.
    pub fn new(command: Command, args: Vec<String>) -> (Self, Receiver<Result<(), WalError>>) {
        let (tx, rx) = sync_channel(1);
        (
            Self {
                command,
                args,
                ack: Some(tx),
            },
            rx,
        )
    }

    /// Signals the ack channel exactly once; a no-op if already signaled
    /// or if this Request was constructed without one (e.g. decoded from
    /// disk during replay, where there is no waiting producer). Dropping
    /// the sender afterwards closes the channel, so a duplicate read
    /// observes disconnection rather than a stale value.
    pub fn signal(&mut self, result: Result<(), WalError>) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(result);
        }
    }

    /// Encodes `{command, args}` as a length-prefixed binary frame:
    /// `[total_len: u32][command: u8][num_args: u16]([arg_len: u32][arg bytes])*[crc32c: u32]`.
    pub fn encode(&self, out: &mut BytesMut) {
        let mut body = BytesMut::new();
        body.put_u8(self.command.as_u8());
        body.put_u16(self.args.len() as u16);
        for arg in &self.args {
            body.put_u32(arg.len() as u32);
            body.put_slice(arg.as_bytes());
        }

        let crc = crc32c::crc32c(&body);
        out.put_u32(body.len() as u32 + 4);
        out.put_slice(&body);
        out.put_u32(crc);
    }

    /// Decodes one frame from the front of `buf`, advancing past it.
    /// Returns `Ok(None)` if `buf` does not yet contain a complete frame
    /// (the caller should read more bytes and retry).
    pub fn decode(buf: &mut Bytes) -> Result<Option<Request>, WalError> {
        if buf.len() < 4 {
            return Ok(None);
        }
        let total_len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
        if buf.len() < 4 + total_len {
            return Ok(None);
        }

        let mut frame = buf.slice(4..4 + total_len);
        buf.advance(4 + total_len);

        let body_len = total_len - 4;
        let body = frame.slice(0..body_len);
        let crc_actual = u32::from_be_bytes(frame[body_len..body_len + 4].try_into().unwrap());
        frame.advance(total_len);

        let crc_expected = crc32c::crc32c(&body);
        if crc_actual != crc_expected {
            return Err(WalError::CorruptedRecord {
                offset: 0,
                expected: crc_expected,
                actual: crc_actual,
            });
        }

        let mut body = body;
        if body.is_empty() {
            return Err(WalError::InvalidHeader {
                offset: 0,
                reason: "empty record body".to_string(),
            });
        }
        let tag = body.get_u8();
        let command = Command::from_u8(tag).ok_or_else(|| WalError::InvalidHeader {
            offset: 0,
            reason: format!("unknown command tag {tag}"),
        })?;

        if body.remaining() < 2 {
            return Err(WalError::InvalidHeader {
                offset: 0,
                reason: "truncated argument count".to_string(),
            });
        }
        let num_args = body.get_u16() as usize;
        let mut args = Vec::with_capacity(num_args);
        for _ in 0..num_args {
            if body.remaining() < 4 {
                return Err(WalError::InvalidHeader {
                    offset: 0,
                    reason: "truncated argument length".to_string(),
                });
            }
            let len = body.get_u32() as usize;
            if body.remaining() < len {
                return Err(WalError::InvalidHeader {
                    offset: 0,
                    reason: "truncated argument bytes".to_string(),
                });
            }
            let raw = body.copy_to_bytes(len);
            let arg = String::from_utf8(raw.to_vec()).map_err(|_| WalError::InvalidHeader {
                offset: 0,
                reason: "argument is not valid UTF-8".to_string(),
            })?;
            args.push(arg);
        }

        Ok(Some(Request {
            command,
            args,
            ack: None,
        }))
    }
}

/// Encodes a whole batch into one contiguous buffer, in order.
pub fn encode_batch(batch: &[Request]) -> Bytes {
    let mut out = BytesMut::new();
    for req in batch {
        req.encode(&mut out);
    }
    out.freeze()
}

/// Decodes a full segment's bytes into a flat ordered sequence of
/// Requests, stopping at the first decode failure (propagated to the
/// caller) or at a clean EOF.
pub fn decode_all(data: &[u8]) -> Result<Vec<Request>, WalError> {
    let mut buf = Bytes::copy_from_slice(data);
    let mut requests = Vec::new();
    while !buf.is_empty() {
        match Request::decode(&mut buf)? {
            Some(req) => requests.push(req),
            None => break,
        }
    }
    Ok(requests)
}
