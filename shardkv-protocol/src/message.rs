//! Replication messages exchanged between the slave and the master.
//!
//! Both messages share one framing: `[total_len:u32][tag:u8][body][crc32c:u32]`,
//! where `total_len` covers everything after itself (tag, body, and the
//! trailing checksum). This is the same length-prefix-plus-CRC32C shape the
//! WAL uses for its own records, applied here to the two struct shapes the
//! replication link needs.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Safety bound on an incoming frame's declared length. Segment data can be
/// large, but a frame claiming gigabytes is corrupt input, not a real
/// segment.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

const TAG_SLAVE_REQUEST: u8 = 0x01;
const TAG_MASTER_RESPONSE: u8 = 0x02;

/// Sent by the slave at the start of every sync tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveRequest {
    pub last_segment_name: String,
}

impl SlaveRequest {
    pub fn new(last_segment_name: impl Into<String>) -> Self {
        Self {
            last_segment_name: last_segment_name.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let name = self.last_segment_name.as_bytes();
        let mut body = BytesMut::with_capacity(1 + 4 + name.len());
        body.put_u8(TAG_SLAVE_REQUEST);
        body.put_u32(name.len() as u32);
        body.put_slice(name);
        frame(body)
    }

    pub fn decode(buf: &mut Bytes) -> Result<Option<Self>, ProtocolError> {
        let Some(mut body) = take_frame(buf)? else {
            return Ok(None);
        };
        let tag = body.get_u8();
        if tag != TAG_SLAVE_REQUEST {
            return Err(ProtocolError::UnknownTag(tag));
        }
        let name = read_string(&mut body, "last_segment_name")?;
        Ok(Some(Self {
            last_segment_name: name,
        }))
    }
}

/// Sent by the master in reply to a `SlaveRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterResponse {
    pub succeed: bool,
    pub segment_name: String,
    pub segment_data: Vec<u8>,
}

impl MasterResponse {
    /// The slave is caught up: no newer segment exists.
    pub fn caught_up() -> Self {
        Self {
            succeed: true,
            segment_name: String::new(),
            segment_data: Vec::new(),
        }
    }

    /// The master failed to compute the next segment (e.g. directory I/O
    /// error). Carries no segment.
    pub fn failed() -> Self {
        Self {
            succeed: false,
            segment_name: String::new(),
            segment_data: Vec::new(),
        }
    }

    pub fn next_segment(segment_name: String, segment_data: Vec<u8>) -> Self {
        Self {
            succeed: true,
            segment_name,
            segment_data,
        }
    }

    pub fn encode(&self) -> Bytes {
        let name = self.segment_name.as_bytes();
        let mut body = BytesMut::with_capacity(1 + 1 + 4 + name.len() + 4 + self.segment_data.len());
        body.put_u8(TAG_MASTER_RESPONSE);
        body.put_u8(if self.succeed { 1 } else { 0 });
        body.put_u32(name.len() as u32);
        body.put_slice(name);
        body.put_u32(self.segment_data.len() as u32);
        body.put_slice(&self.segment_data);
        frame(body)
    }

    pub fn decode(buf: &mut Bytes) -> Result<Option<Self>, ProtocolError> {
        let Some(mut body) = take_frame(buf)? else {
            return Ok(None);
        };
        let tag = body.get_u8();
        if tag != TAG_MASTER_RESPONSE {
            return Err(ProtocolError::UnknownTag(tag));
        }
        let succeed = body.get_u8() != 0;
        let segment_name = read_string(&mut body, "segment_name")?;
        let data_len = body.get_u32() as usize;
        let segment_data = body.copy_to_bytes(data_len).to_vec();
        Ok(Some(Self {
            succeed,
            segment_name,
            segment_data,
        }))
    }
}

/// Wraps an already-tagged body with the `[total_len][...][crc32c]` framing.
fn frame(body: BytesMut) -> Bytes {
    let crc = crc32c::crc32c(&body);
    let total_len = (body.len() + 4) as u32;
    let mut out = BytesMut::with_capacity(4 + body.len() + 4);
    out.put_u32(total_len);
    out.put_slice(&body);
    out.put_u32(crc);
    out.freeze()
}

/// Pulls one complete frame's body (tag included, checksum verified and
/// stripped) off the front of `buf`, if a full frame is present. Leaves
/// `buf` untouched and returns `Ok(None)` on a partial frame so callers can
/// wait for more bytes to arrive.
fn take_frame(buf: &mut Bytes) -> Result<Option<Bytes>, ProtocolError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let total_len = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    if total_len > MAX_FRAME_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: total_len,
            max: MAX_FRAME_SIZE,
        });
    }
    let total_len = total_len as usize;
    if buf.len() < 4 + total_len {
        return Ok(None);
    }
    if total_len < 4 {
        return Err(ProtocolError::Incomplete { needed: 4 - total_len });
    }

    buf.advance(4);
    let mut chunk = buf.split_to(total_len);
    let body = chunk.split_to(total_len - 4);
    let expected = chunk.get_u32();
    let actual = crc32c::crc32c(&body);
    if expected != actual {
        return Err(ProtocolError::CrcMismatch { expected, actual });
    }
    Ok(Some(body))
}

fn read_string(buf: &mut Bytes, field: &'static str) -> Result<String, ProtocolError> {
    let len = buf.get_u32() as usize;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8 { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slave_request_round_trips() {
        let req = SlaveRequest::new("wal_1700000000123.log");
        let mut encoded = req.encode();
        let decoded = SlaveRequest::decode(&mut encoded).unwrap().unwrap();
        assert_eq!(req, decoded);
        assert!(encoded.is_empty());
    }

    #[test]
    fn slave_request_empty_name_round_trips() {
        let req = SlaveRequest::new("");
        let mut encoded = req.encode();
        let decoded = SlaveRequest::decode(&mut encoded).unwrap().unwrap();
        assert_eq!(decoded.last_segment_name, "");
    }

    #[test]
    fn master_response_caught_up_round_trips() {
        let resp = MasterResponse::caught_up();
        let mut encoded = resp.encode();
        let decoded = MasterResponse::decode(&mut encoded).unwrap().unwrap();
        assert_eq!(resp, decoded);
    }

    #[test]
    fn master_response_with_segment_round_trips() {
        let resp = MasterResponse::next_segment("wal_42.log".into(), vec![1, 2, 3, 4, 5]);
        let mut encoded = resp.encode();
        let decoded = MasterResponse::decode(&mut encoded).unwrap().unwrap();
        assert_eq!(resp, decoded);
    }

    #[test]
    fn master_response_failed_round_trips() {
        let resp = MasterResponse::failed();
        let mut encoded = resp.encode();
        let decoded = MasterResponse::decode(&mut encoded).unwrap().unwrap();
        assert!(!decoded.succeed);
        assert_eq!(decoded.segment_name, "");
        assert!(decoded.segment_data.is_empty());
    }

    #[test]
    fn partial_frame_yields_none() {
        let req = SlaveRequest::new("wal_99.log");
        let encoded = req.encode();
        let mut partial = encoded.slice(0..encoded.len() - 2);
        assert_eq!(SlaveRequest::decode(&mut partial).unwrap(), None);
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let req = SlaveRequest::new("wal_7.log");
        let mut encoded = BytesMut::from(&req.encode()[..]);
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        let mut buf = encoded.freeze();
        let err = SlaveRequest::decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::CrcMismatch { .. }));
    }

    #[test]
    fn wrong_tag_is_rejected() {
        let req = SlaveRequest::new("wal_1.log");
        let encoded = req.encode();
        // decode the slave request's bytes as a master response: tag mismatch.
        let mut buf = encoded;
        let err = MasterResponse::decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(_)));
    }

    #[test]
    fn oversized_declared_length_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_FRAME_SIZE + 1);
        let mut bytes = buf.freeze();
        let err = SlaveRequest::decode(&mut bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn two_messages_back_to_back_decode_in_order() {
        let a = SlaveRequest::new("wal_1.log");
        let b = SlaveRequest::new("wal_2.log");
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&a.encode());
        buf.extend_from_slice(&b.encode());
        let mut bytes = buf.freeze();
        let first = SlaveRequest::decode(&mut bytes).unwrap().unwrap();
        let second = SlaveRequest::decode(&mut bytes).unwrap().unwrap();
        assert_eq!(first, a);
        assert_eq!(second, b);
        assert!(bytes.is_empty());
    }
}
