//! Client facade: the one object a UI talks to.
//!
//! [`ClientFacade`] is a cheap, cloneable handle.  Every method sends a
//! command over an `mpsc` channel to a single background task (the client
//! actor) and waits for the reply on a `oneshot`.  The actor owns the
//! [`ConnectionManager`], the [`RequestSession`], and the [`UiNotifier`], so
//! all protocol state is mutated from one task and needs no locks.
//!
//! ```text
//!   UI ──ClientFacade::login()──► mpsc ──► ClientActor ──► ConnectionManager ──► server
//!   UI ◄───────── UiEvent ◄────── UiNotifier ◄─┘   ▲
//!                                              socket reads / response deadline
//! ```
//!
//! The actor loop `select!`s over three sources: commands, socket reads (only
//! while connected), and the earliest response deadline.
//!
//! # Replies vs. events
//!
//! A method's `Result` says whether the command was accepted.  For `login`
//! and `register`, `Ok(())` means the request is on the wire and the verdict
//! will arrive later as [`UiEvent`]s.  Everything the user should see is
//! reported through the notifier, including rejections.

use std::sync::Arc;

use faceauth_core::{interpret_response, JsonObject, RequestKind, ResponseKind};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, error, info, warn};

use crate::application::request_session::{RequestSession, SessionError, Submission};
use crate::infrastructure::image_source::{CaptureError, ImageSource};
use crate::infrastructure::network::{ConnectionManager, Drain, Endpoint, Inbound};
use crate::infrastructure::storage::{AppConfig, ConfigError, ConfigStore, ServerConfig};
use crate::infrastructure::ui_bridge::{
    ClientSettingsDto, ClientStatusDto, DialogSeverity, UiEvent, UiNotifier,
};

/// Commands queued ahead of the actor.
const COMMAND_QUEUE_DEPTH: usize = 32;

/// Errors returned by [`ClientFacade`] methods.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// The session error, if this is one.
    pub fn as_session(&self) -> Option<&SessionError> {
        match self {
            ClientError::Session(e) => Some(e),
            _ => None,
        }
    }
}

fn actor_gone() -> ClientError {
    ClientError::Session(SessionError::Unexpected(
        "client task has stopped".to_string(),
    ))
}

enum Command {
    Capture {
        reply: oneshot::Sender<Result<usize, ClientError>>,
    },
    Submit {
        kind: RequestKind,
        username: String,
        password: String,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    UpdateSettings {
        settings: ClientSettingsDto,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Disconnect {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<ClientStatusDto>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ── Facade ────────────────────────────────────────────────────────────────────

/// Handle to the running client.
#[derive(Clone)]
pub struct ClientFacade {
    commands: mpsc::Sender<Command>,
}

impl ClientFacade {
    /// Loads the config from `store` and starts the client actor.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ClientError::Config`] if the stored config cannot be read.
    pub fn spawn(
        store: Arc<dyn ConfigStore>,
        images: Arc<dyn ImageSource>,
        notifier: Arc<dyn UiNotifier>,
    ) -> Result<(Self, JoinHandle<()>), ClientError> {
        let config = store.load()?;
        Ok(Self::spawn_with_config(config, store, images, notifier))
    }

    /// Starts the client actor with an already loaded `config`.
    ///
    /// `store` is still used to persist settings changes.
    pub fn spawn_with_config(
        config: AppConfig,
        store: Arc<dyn ConfigStore>,
        images: Arc<dyn ImageSource>,
        notifier: Arc<dyn UiNotifier>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let actor = ClientActor::new(config, rx, store, images, notifier);
        let handle = tokio::spawn(actor.run());
        (Self { commands: tx }, handle)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).await.map_err(|_| actor_gone())?;
        rx.await.map_err(|_| actor_gone())
    }

    /// Captures a face image and keeps it for later submissions.
    ///
    /// Returns the image size in bytes.  On failure the previous capture, if
    /// any, is kept.
    pub async fn capture(&self) -> Result<usize, ClientError> {
        self.request(|reply| Command::Capture { reply }).await?
    }

    /// Submits a login with the captured image.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.submit(RequestKind::Login, username, password).await
    }

    /// Submits a registration with the captured image.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.submit(RequestKind::Register, username, password).await
    }

    /// Submits `kind`; connects first if needed.
    ///
    /// # Errors
    ///
    /// Validation errors ([`SessionError::EmptyCredentials`],
    /// [`SessionError::NoImageCaptured`], [`SessionError::RequestInFlight`])
    /// and transport errors ([`SessionError::ConnectFailed`],
    /// [`SessionError::WriteFailed`]).
    pub async fn submit(
        &self,
        kind: RequestKind,
        username: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        let username = username.to_string();
        let password = password.to_string();
        self.request(|reply| Command::Submit {
            kind,
            username,
            password,
            reply,
        })
        .await?
    }

    /// Validates and persists new server settings.
    ///
    /// Disconnects first if a connection is open.
    pub async fn update_settings(&self, settings: ClientSettingsDto) -> Result<(), ClientError> {
        self.request(|reply| Command::UpdateSettings { settings, reply })
            .await?
    }

    /// Closes the connection.  Returns `true` if one was open.
    pub async fn disconnect(&self) -> Result<bool, ClientError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Returns a status snapshot for the UI.
    pub async fn status(&self) -> Result<ClientStatusDto, ClientError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Disconnects and stops the actor.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

// ── Actor ─────────────────────────────────────────────────────────────────────

struct ClientActor {
    config: AppConfig,
    commands: mpsc::Receiver<Command>,
    conn: ConnectionManager,
    session: RequestSession,
    store: Arc<dyn ConfigStore>,
    images: Arc<dyn ImageSource>,
    notifier: Arc<dyn UiNotifier>,
}

impl ClientActor {
    fn new(
        config: AppConfig,
        commands: mpsc::Receiver<Command>,
        store: Arc<dyn ConfigStore>,
        images: Arc<dyn ImageSource>,
        notifier: Arc<dyn UiNotifier>,
    ) -> Self {
        let endpoint = Endpoint::new(config.server.address.clone(), config.server.port);
        let conn = ConnectionManager::new(endpoint, config.protocol.codec());
        let session = RequestSession::new(config.timeouts.response_timeout());
        Self {
            config,
            commands,
            conn,
            session,
            store,
            images,
            notifier,
        }
    }

    async fn run(mut self) {
        info!(
            "FaceAuth client started (server {}, framing {:?}, policy {:?})",
            self.conn.endpoint(),
            self.conn.codec().framing(),
            self.config.protocol.success_policy()
        );

        loop {
            let deadline = self.session.next_deadline();
            let response_deadline = async move {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };
            let connected = self.conn.is_connected();

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => {
                        debug!("all facade handles dropped");
                        self.shutdown();
                        break;
                    }
                },
                inbound = self.conn.next_inbound(), if connected => self.handle_inbound(inbound),
                () = response_deadline => self.handle_deadlines(Instant::now()),
            }
        }

        info!("FaceAuth client stopped");
    }

    fn notify(&self, event: UiEvent) {
        self.notifier.notify(event);
    }

    /// Returns `false` when the actor should stop.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Capture { reply } => {
                let result = self.capture().await;
                let _ = reply.send(result);
            }
            Command::Submit {
                kind,
                username,
                password,
                reply,
            } => {
                let result = self
                    .submit(kind, &username, &password)
                    .await
                    .map_err(ClientError::from);
                let _ = reply.send(result);
            }
            Command::UpdateSettings { settings, reply } => {
                let _ = reply.send(self.update_settings(settings));
            }
            Command::Disconnect { reply } => {
                let was_open = self.conn.is_connected();
                if was_open {
                    info!("disconnect requested by user");
                    self.on_connection_lost();
                }
                let _ = reply.send(was_open);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    async fn capture(&mut self) -> Result<usize, ClientError> {
        match self.images.capture().await {
            Ok(image) => {
                let len = self.session.store_capture(image);
                info!("captured face image ({len} bytes)");
                self.notify(UiEvent::status("Face image captured"));
                Ok(len)
            }
            Err(e) => {
                warn!("face capture failed: {e}");
                self.notify(UiEvent::dialog(
                    "Face capture failed",
                    DialogSeverity::Warning,
                    e.to_string(),
                ));
                Err(e.into())
            }
        }
    }

    async fn submit(
        &mut self,
        kind: RequestKind,
        username: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let submission = match self.session.begin(kind, username, password) {
            Ok(submission) => submission,
            Err(e) => {
                self.report_rejected(kind, &e);
                return Err(e);
            }
        };

        info!(
            "[{}] starting {kind} exchange for user {:?}",
            submission.exchange_id, submission.request.username
        );
        self.notify(UiEvent::control(kind, false));

        match self.send_submission(&submission).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail_exchange(kind, &e);
                Err(e)
            }
        }
    }

    async fn send_submission(&mut self, submission: &Submission) -> Result<(), SessionError> {
        let kind = submission.request.kind;
        let id = submission.exchange_id;

        if !self.conn.is_connected() {
            self.notify(UiEvent::status("Connecting to server..."));
            self.conn
                .connect(self.config.timeouts.connect_timeout())
                .await?;
            self.notify(UiEvent::status("Connected to server"));
        }

        let frame = self
            .conn
            .codec()
            .encode_request(&submission.request)
            .map_err(|e| SessionError::Unexpected(e.to_string()))?;
        let len = frame.len();

        match self
            .conn
            .send_frame(frame, self.config.timeouts.write_drain_timeout())
            .await?
        {
            Drain::Complete => debug!("[{id}] {len}-byte {kind} frame flushed"),
            Drain::TimedOut => warn!("[{id}] {kind} frame still draining; awaiting response anyway"),
        }

        self.session.mark_sent(kind, Instant::now());
        info!("[{id}] sent {kind} request ({len} bytes), awaiting response");
        self.notify(UiEvent::status(format!(
            "Sent {len} bytes to server, awaiting response..."
        )));
        Ok(())
    }

    fn update_settings(&mut self, settings: ClientSettingsDto) -> Result<(), ClientError> {
        let server = match ServerConfig::from_input(&settings.server_address, settings.server_port)
        {
            Ok(server) => server,
            Err(e) => {
                warn!("rejected server settings: {e}");
                self.notify(UiEvent::dialog(
                    "Invalid server settings",
                    DialogSeverity::Warning,
                    e.to_string(),
                ));
                return Err(e.into());
            }
        };

        if self.conn.is_connected() {
            info!("server settings changed while connected; disconnecting first");
            self.on_connection_lost();
        }
        self.conn
            .set_endpoint(Endpoint::new(server.address.clone(), server.port));
        self.config.server = server;

        if let Err(e) = self.store.save(&self.config) {
            error!("failed to persist server settings: {e}");
            self.notify(UiEvent::dialog(
                "Failed to save settings",
                DialogSeverity::Warning,
                e.to_string(),
            ));
            return Err(e.into());
        }

        info!("server settings updated to {}", self.conn.endpoint());
        self.notify(UiEvent::status("Server settings updated"));
        Ok(())
    }

    fn status(&self) -> ClientStatusDto {
        ClientStatusDto {
            connection_status: format!("{:?}", self.conn.state()),
            server_endpoint: self.conn.endpoint().to_string(),
            login_state: format!("{:?}", self.session.state(RequestKind::Login)),
            register_state: format!("{:?}", self.session.state(RequestKind::Register)),
            captured_image_bytes: self.session.captured_len(),
        }
    }

    fn shutdown(&mut self) {
        let aborted = self.session.finish_all();
        if !aborted.is_empty() {
            info!("shutting down with {aborted:?} still in flight");
        }
        self.conn.disconnect();
    }

    // ── Exchange outcomes ─────────────────────────────────────────────────────

    fn report_rejected(&self, kind: RequestKind, err: &SessionError) {
        debug!("{kind} submit rejected: {err}");
        let event = match err {
            SessionError::RequestInFlight(_) => {
                UiEvent::status(format!("{} request already in progress", kind.label()))
            }
            SessionError::EmptyCredentials => UiEvent::dialog(
                "Input error",
                DialogSeverity::Warning,
                "Username and password must not be empty",
            ),
            SessionError::NoImageCaptured => UiEvent::dialog(
                "Face image required",
                DialogSeverity::Warning,
                match kind {
                    RequestKind::Login => "Please capture a face image before logging in",
                    RequestKind::Register => "Please capture a face image before registering",
                },
            ),
            other => UiEvent::dialog(
                format!("{} rejected", kind.label()),
                DialogSeverity::Warning,
                other.to_string(),
            ),
        };
        self.notify(event);
    }

    /// Ends a submit that failed before reaching `AwaitingResponse`.
    fn fail_exchange(&mut self, kind: RequestKind, err: &SessionError) {
        warn!("{kind} exchange failed: {err}");
        if self.session.finish(kind) {
            self.notify(UiEvent::control(kind, true));
        }

        match err {
            SessionError::ConnectFailed { .. } => self.notify(UiEvent::dialog(
                "Connection error",
                DialogSeverity::Critical,
                err.to_string(),
            )),
            SessionError::WriteFailed(reason) => {
                self.notify(UiEvent::status(format!("Failed to send data: {reason}")));
                self.on_connection_lost();
            }
            SessionError::Disconnected => self.on_connection_lost(),
            other => self.notify(UiEvent::dialog(
                format!("{} failed", kind.label()),
                DialogSeverity::Warning,
                other.to_string(),
            )),
        }
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Pending => {}
            Inbound::Frame(obj) => self.handle_response(&obj),
            Inbound::Violation(e) => {
                let err = SessionError::Protocol(e);
                warn!("aborting in-flight requests: {err}");
                for kind in self.session.finish_all() {
                    self.notify(UiEvent::control(kind, true));
                }
                self.notify(UiEvent::dialog(
                    "Error: invalid response from server",
                    DialogSeverity::Warning,
                    err.to_string(),
                ));
            }
            Inbound::Closed => self.on_connection_lost(),
            Inbound::Failed(e) => {
                warn!("connection lost: {e}");
                self.on_connection_lost();
            }
        }
    }

    fn handle_response(&mut self, obj: &JsonObject) {
        let outcome = interpret_response(obj, self.config.protocol.success_policy());

        let kind = match outcome.kind {
            ResponseKind::Action(kind) => kind,
            ResponseKind::Unknown(ref response_type) => {
                warn!("unknown response type {response_type:?}; clearing pending requests");
                for kind in self.session.finish_all() {
                    self.notify(UiEvent::control(kind, true));
                }
                self.notify(UiEvent::status(format!(
                    "Unknown response type: {response_type}"
                )));
                return;
            }
        };

        let Some(id) = self.session.exchange_id(kind) else {
            warn!("ignoring {kind} response with no request in flight");
            return;
        };
        self.session.finish(kind);
        self.notify(UiEvent::control(kind, true));

        let label = kind.label();
        if outcome.success {
            info!("[{id}] {kind} succeeded: {}", outcome.message);
            self.notify(UiEvent::dialog(
                format!("{label} successful: {}", outcome.message),
                DialogSeverity::Information,
                outcome.message,
            ));
        } else {
            info!("[{id}] {kind} rejected by server: {}", outcome.message);
            self.notify(UiEvent::dialog(
                format!("{label} failed: {}", outcome.message),
                DialogSeverity::Warning,
                outcome.message,
            ));
        }
    }

    fn handle_deadlines(&mut self, now: Instant) {
        let timeout = self.session.response_timeout().unwrap_or_default();
        let expired = self.session.expired(now);
        if !expired.is_empty() {
            // A late partial reply would otherwise prefix the next response.
            self.conn.reset_buffer();
        }
        for kind in expired {
            let id = self.session.exchange_id(kind);
            if !self.session.finish(kind) {
                continue;
            }
            let err = SessionError::ResponseTimeout(timeout);
            warn!("[{}] {kind}: {err}", id.map(|u| u.to_string()).unwrap_or_default());
            self.notify(UiEvent::control(kind, true));
            self.notify(UiEvent::dialog(
                format!("{} timed out", kind.label()),
                DialogSeverity::Warning,
                err.to_string(),
            ));
        }
    }

    /// Closes the socket and aborts every in-flight action.
    fn on_connection_lost(&mut self) {
        self.conn.disconnect();
        self.notify(UiEvent::status("Disconnected from server"));
        for kind in self.session.finish_all() {
            self.notify(UiEvent::control(kind, true));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
