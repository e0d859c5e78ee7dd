//! Network infrastructure for the client application.
//!
//! One persistent TCP connection to the FaceAuth server, shared by login and
//! registration.  [`ConnectionManager`] is the only owner of the socket; the
//! client actor drives it and never touches the stream directly.

pub mod connection_manager;

pub use connection_manager::{
    ConnectionManager, ConnectionState, Drain, Endpoint, Inbound, NetworkError,
};
