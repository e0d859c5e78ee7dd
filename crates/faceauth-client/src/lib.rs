//! faceauth-client library entry point.
//!
//! # What does faceauth-client do? (for beginners)
//!
//! A FaceAuth client logs a user in, or registers them, by sending their
//! username, password, and a captured face image to a FaceAuth server.  The
//! server answers with a verdict.  This crate is everything between the
//! buttons of a login window and the TCP socket:
//!
//! 1. Captures a face image through an [`ImageSource`] and keeps it.
//! 2. On Login or Register, validates the input, connects if needed, and
//!    writes one `FACE` frame (see `faceauth_core::protocol`).
//! 3. Reassembles the `RESP` frame from however many reads it takes,
//!    interprets the verdict, and reports it through a [`UiNotifier`].
//! 4. Guarantees that each button is disabled while its request is in flight
//!    and re-enabled exactly once afterwards, whatever happens (response,
//!    garbage, disconnect, timeout).
//!
//! The UI toolkit itself is not part of this crate.  A shell constructs a
//! [`ClientFacade`] and listens for [`UiEvent`]s.
//!
//! ```no_run
//! use std::sync::Arc;
//! use faceauth_client::{
//!     logging, ChannelNotifier, ClientFacade, FileImageSource, TomlConfigStore,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(TomlConfigStore::platform_default()?);
//! logging::init_logging("info");
//! let (notifier, mut events) = ChannelNotifier::new();
//! let (client, _task) = ClientFacade::spawn(
//!     store,
//!     Arc::new(FileImageSource::new("face.jpg")),
//!     Arc::new(notifier),
//! )?;
//!
//! client.capture().await?;
//! client.login("alice", "secret").await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

/// Application layer: the request session state machine.
pub mod application;

/// The client actor and its handle.
pub mod facade;

/// Infrastructure layer: network, UI bridge, image source, and storage.
pub mod infrastructure;

/// `tracing` subscriber setup.
pub mod logging;

pub use application::request_session::{ActionState, RequestSession, SessionError};
pub use facade::{ClientError, ClientFacade};
pub use infrastructure::image_source::{
    CaptureError, FileImageSource, ImageSource, StaticImageSource,
};
pub use infrastructure::network::{ConnectionManager, ConnectionState, Endpoint, NetworkError};
pub use infrastructure::storage::{
    AppConfig, ConfigError, ConfigStore, MemoryConfigStore, TomlConfigStore,
};
pub use infrastructure::ui_bridge::{
    ChannelNotifier, ClientSettingsDto, ClientStatusDto, ControlId, DialogSeverity,
    RecordingNotifier, UiEvent, UiNotifier,
};
