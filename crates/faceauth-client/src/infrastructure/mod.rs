//! Infrastructure layer for the client application.
//!
//! Contains the adapters to the outside world: the TCP connection, the UI
//! event sink, the image source, and config persistence.
//!
//! **Dependency rule**: this layer may depend on `faceauth_core`, but the
//! `application` layer only reaches into it for error conversion.
//!
//! # Sub-modules
//!
//! - **`network`** – `ConnectionManager`: connect with timeout, writer task
//!   with bounded drain, receive buffer and decode on every read.
//!
//! - **`ui_bridge`** – `UiNotifier` trait, `UiEvent`, and the status/settings
//!   DTOs handed to the UI.
//!
//! - **`image_source`** – `ImageSource` trait with file-backed and in-memory
//!   implementations.
//!
//! - **`storage`** – TOML config file and the `ConfigStore` trait.

pub mod image_source;
pub mod network;
pub mod storage;
pub mod ui_bridge;
