//! Length-prefixed tagged message codec.
//!
//! Every message on the wire is a 4-byte big-endian length prefix followed
//! by that many payload bytes. The payload's first byte is the tag; the
//! remainder is tag-dependent. See spec section 4.1 for the full layout.

use crate::error::{CodecError, FrameIoError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_RECIPIENTS: usize = 255;
pub const MAX_BODY: usize = 1024 * 1000;
const HEADER_SIZE: usize = 4;

/// Single-byte message tag, as encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Empty = 0,
    Identity = 1,
    List = 2,
    Relay = 3,
    Stat = 4,
}

impl Tag {
    fn from_byte(b: u8) -> Option<Tag> {
        match b {
            0 => Some(Tag::Empty),
            1 => Some(Tag::Identity),
            2 => Some(Tag::List),
            3 => Some(Tag::Relay),
            4 => Some(Tag::Stat),
            _ => None,
        }
    }
}

/// Shared encode/decode contract for [`Request`] and [`Answer`]. Keeps the
/// codec a pure function over a tagged-variant type rather than dynamic
/// dispatch on message kind, matching spec section 9's "dynamic dispatch on
/// message tag" design note.
pub trait Framed: Sized {
    fn encode(&self) -> Vec<u8>;
    fn decode(buf: &[u8]) -> Result<Self, CodecError>;
}

/// A message sent client -> server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Identity,
    List,
    Relay { recipients: Vec<u64>, body: Vec<u8> },
    /// A tag this implementation does not assign request semantics to
    /// (`Empty`, `Stat`, or anything unrecognized). Dispatch logs and drops
    /// these rather than rejecting the frame.
    Other(u8),
}

impl Request {
    /// Build a Relay request, rejecting oversize recipient lists or bodies
    /// at construction so no bytes are ever produced for an invalid
    /// message.
    pub fn relay(recipients: Vec<u64>, body: Vec<u8>) -> Result<Request, CodecError> {
        if recipients.len() > MAX_RECIPIENTS {
            return Err(CodecError::TooManyRecipients(recipients.len()));
        }
        if body.len() > MAX_BODY {
            return Err(CodecError::BodyTooLarge(body.len()));
        }
        Ok(Request::Relay { recipients, body })
    }
}

impl Framed for Request {
    fn encode(&self) -> Vec<u8> {
        match self {
            Request::Identity => vec![Tag::Identity as u8],
            Request::List => vec![Tag::List as u8],
            Request::Relay { recipients, body } => {
                debug_assert!(recipients.len() <= MAX_RECIPIENTS);
                debug_assert!(body.len() <= MAX_BODY);
                let mut out = Vec::with_capacity(2 + recipients.len() * 8 + body.len());
                out.push(Tag::Relay as u8);
                out.push(recipients.len() as u8);
                for id in recipients {
                    out.extend_from_slice(&id.to_be_bytes());
                }
                out.extend_from_slice(body);
                out
            }
            Request::Other(tag) => vec![*tag],
        }
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.is_empty() {
            return Err(CodecError::EmptyFrame);
        }
        match Tag::from_byte(buf[0]) {
            Some(Tag::Identity) => Ok(Request::Identity),
            Some(Tag::List) => Ok(Request::List),
            Some(Tag::Relay) => {
                if buf.len() < 2 {
                    return Err(CodecError::TruncatedFrame {
                        expected: 2,
                        got: buf.len(),
                    });
                }
                let n = buf[1] as usize;
                let start_body = 2 + n * 8;
                if buf.len() < start_body {
                    return Err(CodecError::TruncatedFrame {
                        expected: start_body,
                        got: buf.len(),
                    });
                }
                let recipients = (0..n)
                    .map(|i| {
                        let s = 2 + i * 8;
                        u64::from_be_bytes(buf[s..s + 8].try_into().expect("8-byte slice"))
                    })
                    .collect();
                let body = buf[start_body..].to_vec();
                Ok(Request::Relay { recipients, body })
            }
            _ => Ok(Request::Other(buf[0])),
        }
    }
}

/// A message sent server -> client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Identity(u64),
    List(Vec<u64>),
    Relay(Vec<u8>),
    Other(u8, Vec<u8>),
}

impl Framed for Answer {
    fn encode(&self) -> Vec<u8> {
        match self {
            Answer::Identity(id) => {
                let mut out = Vec::with_capacity(9);
                out.push(Tag::Identity as u8);
                out.extend_from_slice(&id.to_be_bytes());
                out
            }
            Answer::List(ids) => {
                let mut out = Vec::with_capacity(1 + ids.len() * 8);
                out.push(Tag::List as u8);
                for id in ids {
                    out.extend_from_slice(&id.to_be_bytes());
                }
                out
            }
            Answer::Relay(body) => {
                let mut out = Vec::with_capacity(1 + body.len());
                out.push(Tag::Relay as u8);
                out.extend_from_slice(body);
                out
            }
            Answer::Other(tag, payload) => {
                let mut out = Vec::with_capacity(1 + payload.len());
                out.push(*tag);
                out.extend_from_slice(payload);
                out
            }
        }
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.is_empty() {
            return Err(CodecError::EmptyFrame);
        }
        let rest = &buf[1..];
        match Tag::from_byte(buf[0]) {
            Some(Tag::Identity) => {
                if rest.len() != 8 {
                    return Err(CodecError::TruncatedFrame {
                        expected: 9,
                        got: buf.len(),
                    });
                }
                Ok(Answer::Identity(u64::from_be_bytes(
                    rest.try_into().expect("8-byte slice"),
                )))
            }
            Some(Tag::List) => {
                if rest.len() % 8 != 0 {
                    return Err(CodecError::TruncatedFrame {
                        expected: rest.len() + (8 - rest.len() % 8),
                        got: buf.len(),
                    });
                }
                let ids = rest
                    .chunks_exact(8)
                    .map(|c| u64::from_be_bytes(c.try_into().expect("8-byte slice")))
                    .collect();
                Ok(Answer::List(ids))
            }
            Some(Tag::Relay) => Ok(Answer::Relay(rest.to_vec())),
            _ => Ok(Answer::Other(buf[0], rest.to_vec())),
        }
    }
}

/// Read exactly one frame (header + payload) from `transport`, looping over
/// partial reads. A clean end-of-stream during either phase surfaces as
/// [`FrameIoError::PeerClosed`]; any other transport error is passed
/// through unchanged.
pub async fn read_frame<R: AsyncRead + Unpin>(transport: &mut R) -> Result<Vec<u8>, FrameIoError> {
    let mut header = [0u8; HEADER_SIZE];
    match transport.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameIoError::PeerClosed);
        }
        Err(e) => return Err(FrameIoError::Io(e)),
    }
    let len = u32::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    if len > 0 {
        match transport.read_exact(&mut payload).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(FrameIoError::PeerClosed);
            }
            Err(e) => return Err(FrameIoError::Io(e)),
        }
    }
    Ok(payload)
}

/// Write one frame (header + payload) to `transport`. `write_all` already
/// loops over short writes internally.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    transport: &mut W,
    payload: &[u8],
) -> std::io::Result<()> {
    let len = u32::try_from(payload.len()).expect("payload exceeds u32::MAX, violates MAX_BODY");
    transport.write_all(&len.to_be_bytes()).await?;
    transport.write_all(payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_request_round_trips() {
        let req = Request::Identity;
        let bytes = req.encode();
        assert_eq!(bytes, vec![Tag::Identity as u8]);
        assert_eq!(Request::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn list_request_round_trips() {
        let req = Request::List;
        assert_eq!(Request::decode(&req.encode()).unwrap(), req);
    }

    #[test]
    fn relay_request_round_trips() {
        let req = Request::relay(vec![1, 2, 3], b"hello".to_vec()).unwrap();
        let bytes = req.encode();
        assert_eq!(bytes.len(), 2 + 3 * 8 + 5);
        assert_eq!(Request::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn relay_request_zero_recipients() {
        let req = Request::relay(vec![], b"x".to_vec()).unwrap();
        let bytes = req.encode();
        assert_eq!(bytes, vec![Tag::Relay as u8, 0, b'x']);
        assert_eq!(Request::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn relay_request_rejects_too_many_recipients() {
        let recipients = vec![0u64; MAX_RECIPIENTS + 1];
        let err = Request::relay(recipients, vec![]).unwrap_err();
        assert_eq!(err, CodecError::TooManyRecipients(MAX_RECIPIENTS + 1));
    }

    #[test]
    fn relay_request_rejects_oversize_body() {
        let err = Request::relay(vec![], vec![0u8; MAX_BODY + 1]).unwrap_err();
        assert_eq!(err, CodecError::BodyTooLarge(MAX_BODY + 1));
    }

    #[test]
    fn decode_empty_buffer_fails() {
        assert_eq!(Request::decode(&[]).unwrap_err(), CodecError::EmptyFrame);
        assert_eq!(Answer::decode(&[]).unwrap_err(), CodecError::EmptyFrame);
    }

    #[test]
    fn decode_truncated_relay_fails() {
        // Tag + count=2 but no recipient bytes at all.
        let buf = vec![Tag::Relay as u8, 2];
        assert!(matches!(
            Request::decode(&buf),
            Err(CodecError::TruncatedFrame { .. })
        ));
    }

    #[test]
    fn decode_unknown_tag_is_other() {
        assert_eq!(Request::decode(&[0xFE]).unwrap(), Request::Other(0xFE));
        assert_eq!(
            Answer::decode(&[0xFE, 1, 2]).unwrap(),
            Answer::Other(0xFE, vec![1, 2])
        );
    }

    #[test]
    fn identity_answer_round_trips() {
        let ans = Answer::Identity(42);
        let bytes = ans.encode();
        assert_eq!(bytes.len(), 9);
        assert_eq!(Answer::decode(&bytes).unwrap(), ans);
    }

    #[test]
    fn list_answer_round_trips_including_empty() {
        let ans = Answer::List(vec![]);
        assert_eq!(ans.encode(), vec![Tag::List as u8]);
        assert_eq!(Answer::decode(&ans.encode()).unwrap(), ans);

        let ans = Answer::List(vec![7, 8, 9]);
        assert_eq!(Answer::decode(&ans.encode()).unwrap(), ans);
    }

    #[test]
    fn relay_answer_carries_body_verbatim() {
        let ans = Answer::Relay(b"hi".to_vec());
        let bytes = ans.encode();
        assert_eq!(bytes, vec![Tag::Relay as u8, b'h', b'i']);
        assert_eq!(Answer::decode(&bytes).unwrap(), ans);
    }

    #[tokio::test]
    async fn read_frame_round_trips_over_a_pipe() {
        let (mut client, mut server) = tokio::io::duplex(256);
        let payload = Request::relay(vec![1], b"abc".to_vec()).unwrap().encode();
        write_frame(&mut client, &payload).await.unwrap();
        let got = read_frame(&mut server).await.unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn read_frame_reports_peer_closed_on_clean_eof() {
        let (client, mut server) = tokio::io::duplex(256);
        drop(client);
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, FrameIoError::PeerClosed));
    }
}
