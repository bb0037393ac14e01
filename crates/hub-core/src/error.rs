use thiserror::Error;

/// Errors raised while encoding or decoding a de-framed payload.
///
/// Mirrors the "Construction error" and "Frame decode error" kinds from
/// the error taxonomy: oversize Relay requests are rejected at
/// construction (no bytes ever emitted), while decode errors are raised
/// per-frame and are recoverable at the connection level.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer cannot be empty")]
    EmptyFrame,
    #[error("frame truncated: expected at least {expected} bytes, got {got}")]
    TruncatedFrame { expected: usize, got: usize },
    #[error("relay request has {0} recipients, max is {max}", max = crate::wire::MAX_RECIPIENTS)]
    TooManyRecipients(usize),
    #[error("relay body is {0} bytes, max is {max}", max = crate::wire::MAX_BODY)]
    BodyTooLarge(usize),
}

/// Errors surfaced while reading or writing length-prefixed frames on a
/// byte transport.
#[derive(Debug, Error)]
pub enum FrameIoError {
    /// The peer closed the connection (clean EOF during header or body read).
    #[error("peer closed connection")]
    PeerClosed,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal errors a connection's reader or writer task publishes on its
/// error channel. Never propagated back to the sender synchronously.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("decode error: {0}")]
    Decode(#[from] CodecError),
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal hub-construction errors. The only fatal errors the hub produces
/// are bind failures — there is no retry policy.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
}
