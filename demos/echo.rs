//! Echo demo - a server that echoes every read back to its client.
//!
//! Starts a server on a free local port, connects a client, sends a few
//! lines and prints what comes back.
//!
//! Usage:
//!     cargo run --example echo [-- --debug]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Result;
use tcp_helper::{
    ClientEvent, CorrelationId, EventKind, ServerEvent, TcpClient, TcpServer,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "tcp_helper=debug"
    } else {
        "tcp_helper=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    // Server: hand every read to the echo task
    let server = TcpServer::new();
    let (echo_tx, mut echo_rx) = mpsc::unbounded_channel();
    server.subscribe(EventKind::DataReceived, move |event| {
        if let ServerEvent::DataReceived { key, data } = event {
            let _ = echo_tx.send((key.clone(), data.clone()));
        }
    });
    server.subscribe(EventKind::Connected, |event| {
        if let ServerEvent::ClientConnected { key, .. } = event {
            println!("[server] client {key} connected");
        }
    });

    let local = server.start_local(0).await?;
    println!("[server] listening on {local}");

    let echo_server = server.clone();
    tokio::spawn(async move {
        while let Some((key, data)) = echo_rx.recv().await {
            if let Err(e) = echo_server.send(&key, data, None).await {
                eprintln!("[server] echo to {key} failed: {e}");
            }
        }
    });

    // Client
    let client = TcpClient::builder("127.0.0.1", local.port())
        .retry(3, Duration::from_millis(200))
        .nodelay()
        .build()?;

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    client.subscribe(EventKind::DataReceived, move |event| {
        if let ClientEvent::DataReceived { data, .. } = event {
            let _ = reply_tx.send(String::from_utf8_lossy(data).into_owned());
        }
    });

    client.connect(Some(CorrelationId::new("echo-demo"))).await?;

    for line in ["Hello world!", "ping", "bye"] {
        client.send_text(line, None).await?;
        match tokio::time::timeout(Duration::from_secs(2), reply_rx.recv()).await {
            Ok(Some(reply)) => println!("[client] echoed: {reply}"),
            _ => println!("[client] no echo for {line:?}"),
        }
    }

    client.close();
    server.close();

    let probe = TcpClient::try_connect_test("127.0.0.1", local.port(), Duration::from_secs(1));
    println!("[probe] after close: success={}", probe.is_success());

    Ok(())
}
