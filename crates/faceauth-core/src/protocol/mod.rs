//! Protocol module containing message types, the frame codec, and the
//! receive buffer.

pub mod buffer;
pub mod codec;
pub mod messages;

pub use buffer::ReceiveBuffer;
pub use codec::{encode_response, FrameCodec, ProtocolError, RequestFraming};
pub use messages::*;
