//! End-to-end tests over a loopback socket

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use pctochat::{RelayConfig, RelayServer, ServerConfig};

struct TestServer {
    addr: SocketAddr,
    server: Arc<RelayServer>,
    shutdown: Option<oneshot::Sender<()>>,
    _public: tempfile::TempDir,
}

impl TestServer {
    async fn start(poll_timeout: Duration) -> Self {
        Self::start_with(poll_timeout, |config| config).await
    }

    async fn start_with(
        poll_timeout: Duration,
        configure: impl FnOnce(ServerConfig) -> ServerConfig,
    ) -> Self {
        let public = tempfile::tempdir().unwrap();
        std::fs::write(public.path().join("index.html"), "<p>chat</p>").unwrap();
        std::fs::write(public.path().join("login.html"), "<p>login</p>").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = configure(
            ServerConfig::with_addr(addr)
                .public_dir(public.path())
                .advertised_address("192.0.2.10"),
        );
        let server = Arc::new(RelayServer::with_relay_config(
            config,
            RelayConfig::default().poll_timeout(poll_timeout),
        ));

        let (tx, rx) = oneshot::channel::<()>();
        let running = Arc::clone(&server);
        tokio::spawn(async move {
            running
                .serve(listener, async move {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            server,
            shutdown: Some(tx),
            _public: public,
        }
    }

    async fn wait_for_subscribers(&self, n: usize) {
        let registry = self.server.broadcaster().registry();
        let deadline = Instant::now() + Duration::from_secs(5);
        while registry.len() < n {
            assert!(Instant::now() < deadline, "subscribers never registered");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

struct Reply {
    status: u16,
    head: String,
    body: Vec<u8>,
}

async fn send(addr: SocketAddr, raw: &[u8]) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut data = Vec::new();
    stream.read_to_end(&mut data).await.unwrap();

    let split = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response head");
    let head = String::from_utf8(data[..split].to_vec()).unwrap();
    let status = head[9..12].parse().unwrap();

    Reply {
        status,
        head,
        body: data[split + 4..].to_vec(),
    }
}

async fn get(addr: SocketAddr, target: &str) -> Reply {
    let raw = format!("GET {} HTTP/1.1\r\nHost: test\r\n\r\n", target);
    send(addr, raw.as_bytes()).await
}

async fn post(addr: SocketAddr, target: &str, body: &str) -> Reply {
    let raw = format!(
        "POST {} HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\n\r\n{}",
        target,
        body.len(),
        body
    );
    send(addr, raw.as_bytes()).await
}

#[tokio::test]
async fn test_post_reaches_every_poller() {
    let server = TestServer::start(Duration::from_secs(5)).await;
    let addr = server.addr;

    let first = tokio::spawn(async move { get(addr, "/api/messages").await });
    let second = tokio::spawn(async move { get(addr, "/api/messages").await });
    server.wait_for_subscribers(2).await;

    let reply = post(addr, "/api/messages", "hello room").await;
    assert_eq!(reply.status, 204);

    for poller in [first, second] {
        let reply = poller.await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, b"hello room");
    }
    assert!(server.server.broadcaster().registry().is_empty());
}

#[tokio::test]
async fn test_poll_times_out_with_no_content() {
    let server = TestServer::start(Duration::from_millis(200)).await;

    let start = Instant::now();
    let reply = get(server.addr, "/api/messages").await;

    assert_eq!(reply.status, 204);
    assert!(reply.body.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(server.server.broadcaster().registry().is_empty());
}

#[tokio::test]
async fn test_disconnected_poller_is_unregistered() {
    let server = TestServer::start(Duration::from_secs(30)).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /api/messages HTTP/1.1\r\nHost: test\r\n\r\n")
        .await
        .unwrap();
    server.wait_for_subscribers(1).await;

    drop(stream);

    let registry = server.server.broadcaster().registry();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !registry.is_empty() {
        assert!(Instant::now() < deadline, "registration leaked");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_login_and_join_flow() {
    let server = TestServer::start(Duration::from_secs(5)).await;
    let addr = server.addr;

    let reply = get(addr, "/").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, b"<p>login</p>");
    assert!(reply.head.contains("Content-Type: text/html; charset=utf-8"));

    let poller = tokio::spawn(async move { get(addr, "/api/messages").await });
    server.wait_for_subscribers(1).await;

    let reply = get(addr, "/?u=Eve%20Smith").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, b"<p>chat</p>");

    let reply = poller.await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(value["type"], "system");
    assert_eq!(value["content"], "Now entering room: Eve Smith");
}

#[tokio::test]
async fn test_room_details() {
    let server = TestServer::start(Duration::from_secs(5)).await;

    let reply = get(server.addr, "/api/room/details").await;
    let value: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();

    assert_eq!(reply.status, 200);
    assert!(reply.head.contains("Content-Type: application/json"));
    assert_eq!(value["serverIP"], "192.0.2.10");
    assert_eq!(value["port"], server.addr.port());
}

#[tokio::test]
async fn test_bad_requests() {
    let server = TestServer::start(Duration::from_secs(5)).await;

    let reply = send(server.addr, b"NONSENSE\r\n\r\n").await;
    assert_eq!(reply.status, 400);

    let reply = get(server.addr, "/missing.png").await;
    assert_eq!(reply.status, 404);

    let reply = send(
        server.addr,
        b"DELETE /api/messages HTTP/1.1\r\nHost: test\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 405);
    assert!(reply.head.contains("Allow: GET, POST"));
}

#[tokio::test]
async fn test_chunked_post_is_refused() {
    let server = TestServer::start(Duration::from_millis(300)).await;
    let addr = server.addr;

    let poller = tokio::spawn(async move { get(addr, "/api/messages").await });
    server.wait_for_subscribers(1).await;

    let reply = send(
        addr,
        b"POST /api/messages HTTP/1.1\r\nHost: test\r\nTransfer-Encoding: chunked\r\n\r\n\
          5\r\nhello\r\n0\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 501);

    // The poller must not receive an empty message
    let reply = poller.await.unwrap();
    assert_eq!(reply.status, 204);
    assert!(reply.body.is_empty());
    assert_eq!(server.server.broadcaster().stats().messages_published, 0);
}

#[tokio::test]
async fn test_oversized_body_gets_full_413() {
    let server = TestServer::start_with(Duration::from_secs(5), |config| {
        config.max_body_size(16)
    })
    .await;

    let body = "x".repeat(64 * 1024);
    let reply = post(server.addr, "/api/messages", &body).await;

    assert_eq!(reply.status, 413);
    assert!(reply.head.contains("Connection: close"));
    assert_eq!(reply.body, b"Request body exceeds 16 bytes");
    assert_eq!(server.server.broadcaster().stats().messages_published, 0);
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown() {
    let server = RelayServer::new(ServerConfig::with_addr("127.0.0.1:0".parse().unwrap()));

    let result = tokio::time::timeout(Duration::from_secs(5), server.run_until(async {})).await;

    assert!(matches!(result, Ok(Ok(()))));
}
