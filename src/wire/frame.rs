// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

/// Header fields carried by every frame, per spec §6: a correlation
/// identifier (16 bytes), the optional request-name string, a priority
/// integer (default 0, higher served first by compliant servers), and
/// the body bytes.
///
/// Wire layout (all integers big-endian):
/// ```text
/// u32  total_len            (everything after this field)
/// [16] correlation_id
/// u32  priority
/// u16  name_len
/// [name_len] name (UTF-8)
/// [..] body
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub correlation_id: Uuid,
    pub request_name: String,
    pub priority: u32,
    pub body: Bytes,
}

impl Frame {
    pub fn new(
        correlation_id: Uuid,
        request_name: impl Into<String>,
        priority: u32,
        body: Bytes,
    ) -> Self {
        Self {
            correlation_id,
            request_name: request_name.into(),
            priority,
            body,
        }
    }
}

/// Maximum frame body size accepted by the decoder, guarding against a
/// corrupt or malicious length field allocating unbounded memory.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

const LEN_FIELD: usize = 4;
const CORRELATION_ID_FIELD: usize = 16;
const PRIORITY_FIELD: usize = 4;
const NAME_LEN_FIELD: usize = 2;

#[derive(Debug, Default)]
pub struct FrameCodec;

impl Encoder<Frame> for FrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let name_bytes = frame.request_name.as_bytes();
        if name_bytes.len() > u16::MAX as usize {
            return Err(std::io::Error::other("request name too long"));
        }
        let body_len = frame.body.len();
        let after_len = CORRELATION_ID_FIELD
            + PRIORITY_FIELD
            + NAME_LEN_FIELD
            + name_bytes.len()
            + body_len;
        if after_len > MAX_FRAME_LEN as usize {
            return Err(std::io::Error::other("frame too large"));
        }

        dst.reserve(LEN_FIELD + after_len);
        dst.put_u32(after_len as u32);
        dst.extend_from_slice(frame.correlation_id.as_bytes());
        dst.put_u32(frame.priority);
        dst.put_u16(name_bytes.len() as u16);
        dst.extend_from_slice(name_bytes);
        dst.extend_from_slice(&frame.body);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Error = std::io::Error;
    type Item = Frame;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_FIELD {
            return Ok(None);
        }
        let total_len = u32::from_be_bytes(src[..LEN_FIELD].try_into().expect("4 bytes"));
        if total_len > MAX_FRAME_LEN {
            return Err(std::io::Error::other(format!(
                "frame of {total_len} bytes exceeds {MAX_FRAME_LEN}"
            )));
        }
        let frame_end = LEN_FIELD + total_len as usize;
        if src.len() < frame_end {
            src.reserve(frame_end - src.len());
            return Ok(None);
        }

        let mut buf = src.split_to(frame_end);
        buf.advance(LEN_FIELD);

        if buf.len() < CORRELATION_ID_FIELD + PRIORITY_FIELD + NAME_LEN_FIELD {
            return Err(std::io::Error::other("truncated frame header"));
        }
        let mut id_bytes = [0u8; 16];
        id_bytes.copy_from_slice(&buf[..CORRELATION_ID_FIELD]);
        buf.advance(CORRELATION_ID_FIELD);
        let correlation_id = Uuid::from_bytes(id_bytes);

        let priority = buf.get_u32();
        let name_len = buf.get_u16() as usize;
        if buf.len() < name_len {
            return Err(std::io::Error::other("truncated frame name"));
        }
        let name_bytes = buf.split_to(name_len);
        let request_name = String::from_utf8(name_bytes.to_vec())
            .map_err(|e| std::io::Error::other(format!("invalid request name: {e}")))?;

        let body = buf.freeze();

        Ok(Some(Frame {
            correlation_id,
            request_name,
            priority,
            body,
        }))
    }
}
