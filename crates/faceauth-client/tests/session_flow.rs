//! End-to-end tests for the client facade against a loopback fake server.
//!
//! Each test starts a `TcpListener` on an ephemeral port, points a client at
//! it, and plays the server side by hand: read one `FACE` frame, answer with
//! whatever `RESP` bytes the scenario needs (or none at all).

use std::sync::Arc;
use std::time::Duration;

use faceauth_client::{
    AppConfig, ClientFacade, ClientSettingsDto, ControlId, DialogSeverity, MemoryConfigStore,
    RecordingNotifier, SessionError, StaticImageSource,
};
use faceauth_core::{encode_response, AuthRequest, FrameCodec, RequestKind};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time,
};

const FACE: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    client: ClientFacade,
    notifier: Arc<RecordingNotifier>,
    store: Arc<MemoryConfigStore>,
    listener: TcpListener,
}

async fn start_with(configure: impl FnOnce(&mut AppConfig)) -> Harness {
    start_with_image(FACE.to_vec(), configure).await
}

async fn start_with_image(image: Vec<u8>, configure: impl FnOnce(&mut AppConfig)) -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = AppConfig::default();
    config.server.address = "127.0.0.1".to_string();
    config.server.port = listener.local_addr().unwrap().port();
    configure(&mut config);

    let store = Arc::new(MemoryConfigStore::new(config.clone()));
    let notifier = Arc::new(RecordingNotifier::new());
    let (client, _task) = ClientFacade::spawn_with_config(
        config,
        store.clone(),
        Arc::new(StaticImageSource::new(image)),
        notifier.clone(),
    );
    client.capture().await.unwrap();

    Harness {
        client,
        notifier,
        store,
        listener,
    }
}

async fn start() -> Harness {
    start_with(|_| {}).await
}

/// Reads one request frame the way a server using JSON-length framing does.
async fn read_request(stream: &mut TcpStream) -> AuthRequest {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(&header[..4], b"FACE");
    let json_len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let mut body = vec![0u8; json_len];
    stream.read_exact(&mut body).await.unwrap();
    let meta: Value = serde_json::from_slice(&body).unwrap();
    let image_len = meta["face_data_size"].as_u64().unwrap() as usize;

    let mut image = vec![0u8; image_len];
    stream.read_exact(&mut image).await.unwrap();

    let mut frame = header.to_vec();
    frame.extend(body);
    frame.extend(image);
    let (request, consumed) = FrameCodec::default().decode_request(&frame).unwrap();
    assert_eq!(consumed, frame.len());
    request
}

async fn respond(stream: &mut TcpStream, body: Value) {
    let frame = encode_response(&body).unwrap();
    stream.write_all(&frame).await.unwrap();
}

/// Polls until `pred` holds, failing the test after five seconds.
async fn wait_until(notifier: &RecordingNotifier, pred: impl Fn(&RecordingNotifier) -> bool) {
    time::timeout(Duration::from_secs(5), async {
        while !pred(notifier) {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

fn enabled(n: &RecordingNotifier, control: ControlId) -> usize {
    n.control_count(control, true)
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_round_trip() {
    // Arrange
    let h = start().await;

    // Act
    h.client.login("  alice ", "secret").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let request = read_request(&mut server).await;
    respond(
        &mut server,
        json!({"type": "login", "success": true, "message": "Welcome alice"}),
    )
    .await;
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 1).await;

    // Assert
    assert_eq!(request.kind, RequestKind::Login);
    assert_eq!(request.username, "alice");
    assert_eq!(request.password, "secret");
    assert_eq!(request.image, FACE);

    let statuses = h.notifier.status_texts();
    assert!(statuses.contains(&"Connecting to server...".to_string()));
    assert!(statuses.contains(&"Connected to server".to_string()));
    assert!(statuses
        .iter()
        .any(|s| s.starts_with("Sent ") && s.ends_with(" bytes to server, awaiting response...")));
    assert_eq!(
        h.notifier.dialogs().last(),
        Some(&(DialogSeverity::Information, "Welcome alice".to_string()))
    );
    assert_eq!(h.client.status().await.unwrap().connection_status, "Connected");
}

#[tokio::test]
async fn test_register_failure_shows_warning() {
    let h = start().await;

    h.client.register("bob", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let request = read_request(&mut server).await;
    respond(
        &mut server,
        json!({"type": "register", "success": "no", "message": "User exists"}),
    )
    .await;
    wait_until(&h.notifier, |n| enabled(n, ControlId::RegisterButton) == 1).await;

    assert_eq!(request.kind, RequestKind::Register);
    assert_eq!(
        h.notifier.dialogs().last(),
        Some(&(DialogSeverity::Warning, "User exists".to_string()))
    );
}

#[tokio::test]
async fn test_two_rapid_logins_send_exactly_one_frame() {
    // Arrange
    let h = start().await;

    // Act
    let (first, second) = tokio::join!(
        h.client.login("alice", "pw"),
        h.client.login("alice", "pw")
    );
    let (mut server, _) = h.listener.accept().await.unwrap();
    let _request = read_request(&mut server).await;
    let mut extra = [0u8; 1];
    let more = time::timeout(Duration::from_millis(200), server.read(&mut extra)).await;

    // Assert
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(
        rejected.as_session(),
        Some(&SessionError::RequestInFlight(RequestKind::Login))
    );
    assert!(more.is_err(), "no second frame may reach the server");
    assert!(h
        .notifier
        .status_texts()
        .contains(&"Login request already in progress".to_string()));
    assert_eq!(h.notifier.control_count(ControlId::LoginButton, false), 1);
}

#[tokio::test]
async fn test_disconnect_while_awaiting_reenables_control_once() {
    // Arrange
    let h = start().await;
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let _request = read_request(&mut server).await;

    // Act
    drop(server);
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) >= 1).await;
    time::sleep(Duration::from_millis(100)).await;

    // Assert
    assert_eq!(enabled(&h.notifier, ControlId::LoginButton), 1);
    assert!(h
        .notifier
        .status_texts()
        .contains(&"Disconnected from server".to_string()));
    assert!(
        h.notifier.dialogs().is_empty(),
        "no verdict may be fabricated after a disconnect"
    );
    let status = h.client.status().await.unwrap();
    assert_eq!(status.connection_status, "Disconnected");
    assert_eq!(status.login_state, "Idle");
}

#[tokio::test]
async fn test_response_split_across_reads_is_delivered_once() {
    // Arrange
    let h = start().await;
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let _request = read_request(&mut server).await;
    let frame =
        encode_response(&json!({"type": "login", "success": 1, "message": "ok"})).unwrap();

    // Act
    server.write_all(&frame[..5]).await.unwrap();
    server.flush().await.unwrap();
    time::sleep(Duration::from_millis(50)).await;
    server.write_all(&frame[5..]).await.unwrap();
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 1).await;
    time::sleep(Duration::from_millis(50)).await;

    // Assert
    assert_eq!(
        h.notifier.dialogs(),
        vec![(DialogSeverity::Information, "ok".to_string())]
    );
}

#[tokio::test]
async fn test_lenient_override_and_strict_policy() {
    let lenient = start().await;
    let strict = start_with(|c| c.protocol.lenient_success = false).await;

    for h in [&lenient, &strict] {
        h.client.login("alice", "pw").await.unwrap();
        let (mut server, _) = h.listener.accept().await.unwrap();
        let _request = read_request(&mut server).await;
        respond(
            &mut server,
            json!({"type": "login", "success": false, "message": "login successful"}),
        )
        .await;
        wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 1).await;
    }

    assert_eq!(lenient.notifier.dialogs()[0].0, DialogSeverity::Information);
    assert_eq!(strict.notifier.dialogs()[0].0, DialogSeverity::Warning);
}

#[tokio::test]
async fn test_response_timeout_fires_once_and_late_reply_is_ignored() {
    // Arrange
    let h = start_with(|c| c.timeouts.response_timeout_secs = 1).await;
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let _request = read_request(&mut server).await;

    // Act
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 1).await;
    respond(
        &mut server,
        json!({"type": "login", "success": true, "message": "too late"}),
    )
    .await;
    time::sleep(Duration::from_millis(200)).await;

    // Assert
    assert_eq!(enabled(&h.notifier, ControlId::LoginButton), 1);
    let dialogs = h.notifier.dialogs();
    assert_eq!(dialogs.len(), 1);
    assert_eq!(dialogs[0].0, DialogSeverity::Warning);
    assert_eq!(dialogs[0].1, "no response from server within 1s");
    assert!(h.notifier.status_texts().contains(&"Login timed out".to_string()));
}

#[tokio::test]
async fn test_partial_reply_before_timeout_does_not_poison_next_exchange() {
    // Arrange: the first reply stops after the magic and one length byte
    let h = start_with(|c| c.timeouts.response_timeout_secs = 1).await;
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let _first = read_request(&mut server).await;
    let stale = encode_response(&json!({"type": "login", "success": true, "message": "lost"}))
        .unwrap();
    server.write_all(&stale[..5]).await.unwrap();
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 1).await;

    // Act: retry on the same connection and answer in full
    h.client.login("alice", "pw").await.unwrap();
    let _second = read_request(&mut server).await;
    respond(
        &mut server,
        json!({"type": "login", "success": true, "message": "Welcome back"}),
    )
    .await;
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 2).await;

    // Assert
    let dialogs = h.notifier.dialogs();
    assert_eq!(dialogs.len(), 2);
    assert_eq!(dialogs[0].1, "no response from server within 1s");
    assert_eq!(
        dialogs[1],
        (DialogSeverity::Information, "Welcome back".to_string())
    );
    assert_eq!(h.client.status().await.unwrap().connection_status, "Connected");
}

#[tokio::test]
async fn test_slow_drain_still_awaits_and_completes_on_verdict() {
    // Arrange: an image far larger than the socket buffers and a 1 ms drain window
    let image = vec![0xA5u8; 32 * 1024 * 1024];
    let h = start_with_image(image.clone(), |c| c.timeouts.write_drain_timeout_ms = 1).await;

    // Act: the server does not read until the client has moved on
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let status = h.client.status().await.unwrap();
    let request = read_request(&mut server).await;
    respond(
        &mut server,
        json!({"type": "login", "success": true, "message": "Welcome alice"}),
    )
    .await;
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 1).await;

    // Assert
    assert_eq!(status.login_state, "AwaitingResponse");
    assert_eq!(request.image.len(), image.len());
    assert!(h
        .notifier
        .status_texts()
        .iter()
        .any(|s| s.starts_with("Sent ") && s.ends_with(" bytes to server, awaiting response...")));
    assert_eq!(
        h.notifier.dialogs(),
        vec![(DialogSeverity::Information, "Welcome alice".to_string())]
    );
}

#[tokio::test]
async fn test_unknown_response_type_clears_every_action() {
    // Arrange
    let h = start().await;
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let _login = read_request(&mut server).await;
    h.client.register("bob", "pw").await.unwrap();
    let _register = read_request(&mut server).await;

    // Act
    respond(&mut server, json!({"type": "logout", "success": true})).await;
    wait_until(&h.notifier, |n| {
        enabled(n, ControlId::LoginButton) == 1 && enabled(n, ControlId::RegisterButton) == 1
    })
    .await;

    // Assert
    assert!(h
        .notifier
        .status_texts()
        .contains(&"Unknown response type: logout".to_string()));
    let status = h.client.status().await.unwrap();
    assert_eq!(status.login_state, "Idle");
    assert_eq!(status.register_state, "Idle");
}

#[tokio::test]
async fn test_bad_magic_aborts_exchange_but_keeps_connection() {
    // Arrange
    let h = start().await;
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let _request = read_request(&mut server).await;

    // Act
    server.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await.unwrap();
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 1).await;

    // Assert
    assert!(h
        .notifier
        .status_texts()
        .contains(&"Error: invalid response from server".to_string()));
    assert_eq!(h.client.status().await.unwrap().connection_status, "Connected");

    // The next exchange on the same connection works normally.
    h.client.login("alice", "pw").await.unwrap();
    let _again = read_request(&mut server).await;
    respond(&mut server, json!({"type": "login", "success": true, "message": "ok"})).await;
    wait_until(&h.notifier, |n| enabled(n, ControlId::LoginButton) == 2).await;
}

#[tokio::test]
async fn test_settings_change_while_connected_disconnects_and_persists() {
    // Arrange
    let h = start().await;
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let _request = read_request(&mut server).await;

    // Act
    h.client
        .update_settings(ClientSettingsDto {
            server_address: "127.0.0.1".to_string(),
            server_port: 9,
        })
        .await
        .unwrap();
    let mut buf = [0u8; 1];
    let eof = time::timeout(Duration::from_secs(2), server.read(&mut buf)).await;

    // Assert
    assert!(matches!(eof, Ok(Ok(0)) | Ok(Err(_))), "server must see the close");
    assert_eq!(enabled(&h.notifier, ControlId::LoginButton), 1);
    let statuses = h.notifier.status_texts();
    let disconnected = statuses
        .iter()
        .position(|s| s == "Disconnected from server")
        .unwrap();
    let updated = statuses
        .iter()
        .position(|s| s == "Server settings updated")
        .unwrap();
    assert!(disconnected < updated, "disconnect happens before the update");
    assert_eq!(h.store.current().server.port, 9);
    let status = h.client.status().await.unwrap();
    assert_eq!(status.connection_status, "Disconnected");
    assert_eq!(status.server_endpoint, "127.0.0.1:9");
}

#[tokio::test]
async fn test_whole_payload_framing_declares_json_plus_image() {
    // Arrange
    let h = start_with(|c| {
        c.protocol.request_framing = faceauth_core::RequestFraming::WholePayload;
    })
    .await;

    // Act
    h.client.login("alice", "pw").await.unwrap();
    let (mut server, _) = h.listener.accept().await.unwrap();
    let mut header = [0u8; 8];
    server.read_exact(&mut header).await.unwrap();
    let declared = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let mut payload = vec![0u8; declared];
    server.read_exact(&mut payload).await.unwrap();

    // Assert
    assert!(payload.ends_with(FACE), "declared length must cover the image");
}
