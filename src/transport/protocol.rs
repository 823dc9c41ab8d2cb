//! nsqd TCP protocol (V2) codec
//!
//! Client to server: the 4-byte magic `"  V2"` once, then newline-terminated
//! commands. `IDENTIFY` is followed by a big-endian `u32` length and a JSON
//! body.
//!
//! Server to client frames:
//! ```text
//! [u32 size][u32 frame type][size - 4 bytes of data]
//! ```
//! A message frame's data is
//! ```text
//! [i64 timestamp ns][u16 attempts][16-byte id][body]
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::message::RawMessage;
use crate::utils::error::ProtocolError;

pub const MAGIC_V2: &[u8; 4] = b"  V2";
pub const HEARTBEAT: &[u8] = b"_heartbeat_";
pub const CLOSE_WAIT: &[u8] = b"CLOSE_WAIT";
pub const OK: &[u8] = b"OK";

pub const FRAME_RESPONSE: u32 = 0;
pub const FRAME_ERROR: u32 = 1;
pub const FRAME_MESSAGE: u32 = 2;

const SIZE_LEN: usize = 4;
const MESSAGE_HEADER_LEN: usize = 8 + 2 + MESSAGE_ID_LEN;
const MESSAGE_ID_LEN: usize = 16;
/// Upper bound on a single frame; nsqd's own default message limit is 1 MiB.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Magic,
    Identify(Vec<u8>),
    Sub { topic: String, channel: String },
    Rdy(u32),
    Fin(String),
    Req { id: String, delay_ms: u64 },
    Nop,
    Cls,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Response(Vec<u8>),
    Error(Vec<u8>),
    Message(RawMessage),
}

#[derive(Debug, Default)]
pub struct NsqCodec;

impl Encoder<Command> for NsqCodec {
    type Error = ProtocolError;

    fn encode(&mut self, command: Command, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match command {
            Command::Magic => buf.extend_from_slice(MAGIC_V2),
            Command::Identify(body) => {
                let len = u32::try_from(body.len())
                    .map_err(|_| ProtocolError::FrameTooLarge(body.len()))?;
                buf.reserve(9 + SIZE_LEN + body.len());
                buf.extend_from_slice(b"IDENTIFY\n");
                buf.put_u32(len);
                buf.extend_from_slice(&body);
            }
            Command::Sub { topic, channel } => line(buf, format!("SUB {topic} {channel}")),
            Command::Rdy(count) => line(buf, format!("RDY {count}")),
            Command::Fin(id) => line(buf, format!("FIN {id}")),
            Command::Req { id, delay_ms } => line(buf, format!("REQ {id} {delay_ms}")),
            Command::Nop => buf.extend_from_slice(b"NOP\n"),
            Command::Cls => buf.extend_from_slice(b"CLS\n"),
        }
        Ok(())
    }
}

fn line(buf: &mut BytesMut, text: String) {
    buf.reserve(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    buf.put_u8(b'\n');
}

impl Decoder for NsqCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if buf.len() < SIZE_LEN {
            return Ok(None);
        }
        let size = (&buf[..SIZE_LEN]).get_u32() as usize;
        if size < 4 {
            return Err(ProtocolError::Malformed("frame shorter than its type"));
        }
        if size > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge(size));
        }
        if buf.len() < SIZE_LEN + size {
            buf.reserve(SIZE_LEN + size - buf.len());
            return Ok(None);
        }

        buf.advance(SIZE_LEN);
        let frame_type = buf.get_u32();
        let mut data = buf.split_to(size - 4);

        match frame_type {
            FRAME_RESPONSE => Ok(Some(Frame::Response(data.to_vec()))),
            FRAME_ERROR => Ok(Some(Frame::Error(data.to_vec()))),
            FRAME_MESSAGE => {
                if data.len() < MESSAGE_HEADER_LEN {
                    return Err(ProtocolError::Malformed("message frame too short"));
                }
                let timestamp = data.get_i64();
                let attempts = data.get_u16();
                let id = data.split_to(MESSAGE_ID_LEN);
                Ok(Some(Frame::Message(RawMessage {
                    id: String::from_utf8_lossy(&id).into_owned(),
                    timestamp,
                    attempts,
                    body: data.to_vec(),
                })))
            }
            other => Err(ProtocolError::UnknownFrameType(other)),
        }
    }
}

/// Encodes a server frame; nsqd's side of the codec, used to script a broker.
pub fn encode_frame(frame_type: u32, data: &[u8], buf: &mut BytesMut) {
    buf.reserve(SIZE_LEN + 4 + data.len());
    buf.put_u32((data.len() + 4) as u32);
    buf.put_u32(frame_type);
    buf.extend_from_slice(data);
}

/// Message frame data for `message`. The id is padded or cut to 16 bytes.
pub fn encode_message(message: &RawMessage) -> Vec<u8> {
    let mut data = Vec::with_capacity(MESSAGE_HEADER_LEN + message.body.len());
    data.put_i64(message.timestamp);
    data.put_u16(message.attempts);
    let mut id = [b'0'; MESSAGE_ID_LEN];
    let raw = message.id.as_bytes();
    let n = raw.len().min(MESSAGE_ID_LEN);
    id[MESSAGE_ID_LEN - n..].copy_from_slice(&raw[raw.len() - n..]);
    data.extend_from_slice(&id);
    data.extend_from_slice(&message.body);
    data
}
