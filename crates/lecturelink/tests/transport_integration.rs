//! Loopback tests for the owner listener and the client exchange.
//!
//! Every test binds port 0 on 127.0.0.1 so tests can run in parallel.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use lecturelink::infrastructure::transport::{
    exchange, ExchangeStage, ListenerReport, OwnerListener, TransportError, TransportSettings,
};
use lecturelink_core::ProtocolError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(5);

fn loopback_settings() -> TransportSettings {
    TransportSettings {
        port: 0,
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_millis(300),
        ..TransportSettings::default()
    }
}

/// Opens a listener and returns it with its report queue and client settings.
async fn open_owner() -> (OwnerListener, mpsc::Receiver<ListenerReport>, TransportSettings) {
    let settings = loopback_settings();
    let (tx, rx) = mpsc::channel(16);
    let listener = OwnerListener::open(&settings, 1, tx)
        .await
        .expect("listener should bind");
    let client_settings = TransportSettings {
        port: listener.local_addr().port(),
        ..settings
    };
    (listener, rx, client_settings)
}

fn owner_endpoint(settings: &TransportSettings) -> SocketAddr {
    settings.owner_endpoint(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Sends raw bytes, half-closes, and returns everything the owner wrote back.
async fn raw_exchange(addr: SocketAddr, bytes: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(bytes).await.expect("write");
    stream.shutdown().await.expect("half-close");
    let mut reply = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut reply))
        .await
        .expect("owner should close the connection")
        .expect("read");
    reply
}

// ── Owner behaviour ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reference_greeting_is_reversed_over_loopback() {
    // Arrange
    let (listener, mut reports, settings) = open_owner().await;

    // Act
    let reply = exchange(owner_endpoint(&settings), "Hello from client", &settings).await;

    // Assert
    assert_eq!(assert_ok!(reply), "tneilc morf olleH");
    let report = timeout(WAIT, reports.recv()).await.unwrap().unwrap();
    assert_eq!(report.generation, 1);
    assert_eq!(report.exchange.request, "Hello from client");
    assert_eq!(report.exchange.response, "tneilc morf olleH");
    assert!(!report.exchange.malformed);

    listener.close().await;
}

#[tokio::test]
async fn test_empty_request_gets_empty_reply() {
    let (listener, _reports, settings) = open_owner().await;

    let reply = exchange(owner_endpoint(&settings), "", &settings).await;

    assert_eq!(assert_ok!(reply), "");
    listener.close().await;
}

#[tokio::test]
async fn test_crlf_request_is_answered_without_carriage_return() {
    let (listener, _reports, settings) = open_owner().await;

    let reply = raw_exchange(owner_endpoint(&settings), b"abc\r\n").await;

    assert_eq!(reply, b"cba\n");
    listener.close().await;
}

#[tokio::test]
async fn test_report_carries_decoded_request_and_its_reply() {
    // Arrange
    let (listener, mut reports, settings) = open_owner().await;

    // Act
    let reply = raw_exchange(owner_endpoint(&settings), "añb\r\n".as_bytes()).await;

    // Assert
    assert_eq!(reply, "bña\n".as_bytes());
    let report = timeout(WAIT, reports.recv()).await.unwrap().unwrap();
    assert_eq!(report.exchange.request, "añb");
    assert_eq!(report.exchange.response, "bña");
    assert!(!report.exchange.malformed);
    listener.close().await;
}

#[tokio::test]
async fn test_unterminated_request_gets_empty_reply() {
    // Arrange
    let (listener, mut reports, settings) = open_owner().await;

    // Act: the client hangs up before sending a terminator
    let reply = raw_exchange(owner_endpoint(&settings), b"Hello from cli").await;

    // Assert
    assert_eq!(reply, b"\n");
    let report = timeout(WAIT, reports.recv()).await.unwrap().unwrap();
    assert!(report.exchange.malformed);
    listener.close().await;
}

#[tokio::test]
async fn test_silent_client_is_answered_after_read_timeout() {
    // Arrange
    let (listener, mut reports, settings) = open_owner().await;
    let mut stream = TcpStream::connect(owner_endpoint(&settings)).await.unwrap();

    // Act: send nothing and wait for the owner to give up
    let mut reply = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut reply))
        .await
        .expect("owner should answer after its read timeout")
        .unwrap();

    // Assert
    assert_eq!(reply, b"\n");
    let report = timeout(WAIT, reports.recv()).await.unwrap().unwrap();
    assert!(report.exchange.malformed);
    listener.close().await;
}

#[tokio::test]
async fn test_owner_keeps_serving_after_malformed_request() {
    let (listener, _reports, settings) = open_owner().await;

    let bad = raw_exchange(owner_endpoint(&settings), &[0xFF, 0xFE, b'\n']).await;
    let good = exchange(owner_endpoint(&settings), "still here", &settings).await;

    assert_eq!(bad, b"\n");
    assert_eq!(assert_ok!(good), "ereh llits");
    listener.close().await;
}

#[tokio::test]
async fn test_concurrent_clients_each_get_their_own_reply() {
    // Arrange
    let (listener, _reports, settings) = open_owner().await;

    // Act
    let mut tasks = Vec::new();
    for i in 0..10 {
        let settings = settings.clone();
        tasks.push(tokio::spawn(async move {
            let text = format!("student {i} asks");
            let reply = exchange(owner_endpoint(&settings), &text, &settings).await;
            (text, reply)
        }));
    }

    // Assert
    for task in tasks {
        let (text, reply) = task.await.unwrap();
        let expected: String = text.chars().rev().collect();
        assert_eq!(reply.unwrap(), expected);
    }
    listener.close().await;
}

#[tokio::test]
async fn test_closed_listener_refuses_connections() {
    // Arrange
    let (listener, _reports, settings) = open_owner().await;
    let addr = owner_endpoint(&settings);

    // Act
    listener.close().await;

    // Assert
    let result = exchange(addr, "anyone there?", &settings).await;
    assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let (listener, _reports, _settings) = open_owner().await;
    let (tx, _rx) = mpsc::channel::<ListenerReport>(1);
    let taken = TransportSettings {
        port: listener.local_addr().port(),
        ..loopback_settings()
    };

    let second = OwnerListener::open(&taken, 2, tx).await;

    assert!(matches!(second, Err(TransportError::BindFailed { .. })));
    listener.close().await;
}

// ── Client behaviour ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_client_times_out_when_owner_never_answers() {
    // Arrange: accepts, reads, never replies
    let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = silent.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = silent.accept().await.unwrap();
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink).await;
    });

    // Act
    let result = exchange(addr, "hello?", &loopback_settings()).await;

    // Assert
    assert!(matches!(
        result,
        Err(TransportError::Timeout { stage: ExchangeStage::Reading, .. })
    ));
    server.abort();
}

#[tokio::test]
async fn test_reply_without_terminator_is_an_error() {
    // Arrange: answers without '\n' and closes
    let owner = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = owner.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = owner.accept().await.unwrap();
        let mut buf = [0u8; 64];
        let _ = stream.read(&mut buf).await;
        let _ = stream.write_all(b"olleh").await;
    });

    // Act
    let result = exchange(addr, "hello", &loopback_settings()).await;

    // Assert
    assert!(matches!(
        result,
        Err(TransportError::Protocol(ProtocolError::Unterminated))
    ));
}
