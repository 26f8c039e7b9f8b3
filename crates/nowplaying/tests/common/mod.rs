#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

pub const TIMEOUT: Duration = Duration::from_millis(2000);

/// Serve `app` on an ephemeral localhost port for the rest of the test.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Hex encoding used by the WiiM API for text fields.
pub fn hex(text: &str) -> String {
    text.bytes().map(|b| format!("{:02x}", b)).collect()
}
