// ─── Canned HTTP server for tests ───
// Binds an ephemeral local port, answers a fixed route table and
// counts hits per path. Registry and download tests point their
// base URL here instead of at the real download API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) struct CannedRoute {
    path: String,
    status: u16,
    body: Vec<u8>,
}

impl CannedRoute {
    pub(crate) fn json(path: impl Into<String>, body: &str) -> Self {
        Self {
            path: path.into(),
            status: 200,
            body: body.as_bytes().to_vec(),
        }
    }

    pub(crate) fn bytes(path: impl Into<String>, body: &[u8]) -> Self {
        Self {
            path: path.into(),
            status: 200,
            body: body.to_vec(),
        }
    }

    pub(crate) fn status(path: impl Into<String>, status: u16) -> Self {
        Self {
            path: path.into(),
            status,
            body: Vec::new(),
        }
    }
}

pub(crate) struct CannedServer {
    base_url: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl CannedServer {
    /// Bind to an ephemeral port and start answering in a background task.
    /// The task dies with the test runtime.
    pub(crate) async fn start(routes: Vec<CannedRoute>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

        let routes = Arc::new(routes);
        let hit_log = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                let hit_log = hit_log.clone();
                tokio::spawn(async move {
                    serve_one(stream, routes, hit_log).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// How many requests hit the given path so far.
    pub(crate) fn hits(&self, path: &str) -> usize {
        *self.hits.lock().unwrap().get(path).unwrap_or(&0)
    }
}

async fn serve_one(
    mut stream: TcpStream,
    routes: Arc<Vec<CannedRoute>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
) {
    let Some(path) = read_request_path(&mut stream).await else {
        return;
    };
    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    let (status, body) = match routes.iter().find(|route| route.path == path) {
        Some(route) => (route.status, route.body.as_slice()),
        None => (404, &b""[..]),
    };
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("");

    let head = format!(
        "HTTP/1.1 {status} {reason}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
    let _ = stream.flush().await;
}

async fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..read]);
        if buf.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
        if buf.len() > 16 * 1024 {
            return None;
        }
    }

    // Request line looks like "GET /projects/paper HTTP/1.1".
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    parts.next().map(str::to_string)
}
