//! Application layer for the client.
//!
//! - **`request_session`** – Per-action state machine for login and
//!   registration: input validation, at-most-one-in-flight, response
//!   deadlines, and exactly-once completion.  Pure state; the client actor
//!   performs the I/O around it.

pub mod request_session;
