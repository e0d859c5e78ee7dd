//! Domain rules for the FaceAuth client.
//!
//! Pure logic with no sockets or UI.  The one rule that lives here is how a
//! server verdict is read: see [`response::interpret_response`] and the
//! success-message override documented on [`response::SuccessPolicy`].

/// Response interpretation and the success policy.
pub mod response;
