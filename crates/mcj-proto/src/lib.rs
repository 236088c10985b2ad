//! Minecraft Java Edition (1.12.2) protocol types, framing and packet definitions.

pub mod chat;
pub mod codec;
pub mod error;
pub mod frame;
pub mod packet;
pub mod packets;
pub mod pool;
pub mod profile;
pub mod response;
pub mod status;
pub mod types;
pub mod username;

pub use error::ProtoError;
pub use frame::{OutgoingPacket, MAX_FRAME_LEN};
pub use packet::RawPacket;
pub use pool::BufferPool;
pub use response::ResponseBuilder;
pub use types::Uuid;
