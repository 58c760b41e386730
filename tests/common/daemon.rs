//! Local HTTP daemon answering canned bodies, for wire-level engine tests

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct FakeDaemon {
    /// `tcp://127.0.0.1:<port>`
    pub address: String,
    /// Request heads in arrival order
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl FakeDaemon {
    /// Head of the first request whose request line contains `fragment`
    pub fn request_for(&self, fragment: &str) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|head| head.lines().next().is_some_and(|line| line.contains(fragment)))
            .cloned()
    }
}

/// JSON-lines body as the daemon streams it
pub fn json_lines(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("{}\r\n", line)).collect()
}

/// Serve `(request line fragment, body)` routes; the first match wins, anything else is a 404
pub async fn start(routes: Vec<(&'static str, String)>) -> FakeDaemon {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(answer(socket, routes.clone(), recorded.clone()));
        }
    });

    FakeDaemon {
        address: format!("tcp://127.0.0.1:{}", port),
        requests,
    }
}

async fn answer(mut socket: TcpStream, routes: Vec<(&'static str, String)>, recorded: Arc<Mutex<Vec<String>>>) {
    let head = read_head(&mut socket).await;
    let request_line = head.lines().next().unwrap_or_default().to_string();
    recorded.lock().unwrap().push(head);

    let (status, body) = match routes.iter().find(|(fragment, _)| request_line.contains(fragment)) {
        Some((_, body)) => ("200 OK", body.clone()),
        None => ("404 Not Found", r#"{"message":"No such image"}"#.to_string()),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&head).to_string()
}
