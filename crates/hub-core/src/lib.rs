//! Relay engine: the framed wire codec, id allocation, the peer registry,
//! the per-connection reader/writer tasks, and the hub dispatcher that
//! ties them together.

pub mod connection;
pub mod error;
pub mod hub;
pub mod idpool;
pub mod quit;
pub mod registry;
pub mod stats;
pub mod wire;

pub use connection::Connection;
pub use error::{CodecError, ConnectionError, FrameIoError, HubError};
pub use hub::{Hub, IdPoolKind, ServerConnection};
pub use idpool::{IdPool, IncrementalIdPool, ReusableIdPool};
pub use quit::Quit;
pub use registry::Registry;
pub use stats::{Stats, StatsSnapshot};
pub use wire::{Answer, Framed, Request, Tag, MAX_BODY, MAX_RECIPIENTS};

/// A connection in client mode: decodes `Answer`s, sends `Request`s. The
/// inverse of [`ServerConnection`].
pub type ClientConnection = Connection<Answer, Request>;
