//! A throwaway HTTP/1.1 server for client tests.
//!
//! Each accepted connection is answered with the next canned response, whose
//! body is written in the given parts with a flush between them. Bodies are
//! delimited by closing the connection.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub parts: Vec<Vec<u8>>,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            parts: vec![body.as_bytes().to_vec()],
        }
    }

    pub fn streamed(content_type: &'static str, parts: &[&str]) -> Self {
        Self {
            status: 200,
            content_type,
            parts: parts.iter().map(|p| p.as_bytes().to_vec()).collect(),
        }
    }
}

/// A request as the server saw it.
#[derive(Debug)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub version: String,
    /// Header lines, lowercased.
    pub headers: Vec<String>,
    pub body: String,
}

pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<Vec<Recorded>>,
}

impl TestServer {
    pub async fn start(responses: Vec<Canned>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut recorded = Vec::new();
            for canned in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                recorded.push(read_request(&mut socket).await);

                let head = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
                    canned.status, canned.content_type
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                for part in canned.parts {
                    if socket.write_all(&part).await.is_err() {
                        break;
                    }
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                let _ = socket.shutdown().await;
            }
            recorded
        });

        Self { base_url, handle }
    }

    /// Wait for all canned responses to be served and return the requests.
    pub async fn requests(self) -> Vec<Recorded> {
        self.handle.await.unwrap()
    }
}

/// Serve one streamed response that never ends: `first`, then `filler`
/// every 20 ms. The handle resolves to `true` once a write fails because the
/// client closed the connection, or `false` if it stayed open for 4 seconds.
pub async fn start_endless(
    content_type: &'static str,
    first: &'static str,
    filler: &'static str,
) -> (String, JoinHandle<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nConnection: close\r\n\r\n{}",
            content_type, first
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if socket.write_all(filler.as_bytes()).await.is_err() {
                return true;
            }
        }
        false
    });

    (base_url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Recorded {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buf).await.unwrap();
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if n == 0 {
            break data.len();
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    Recorded {
        method: request_line.next().unwrap_or_default().to_string(),
        path: request_line.next().unwrap_or_default().to_string(),
        version: request_line.next().unwrap_or_default().to_string(),
        headers: head
            .lines()
            .skip(1)
            .filter(|line| !line.is_empty())
            .map(str::to_ascii_lowercase)
            .collect(),
        body: String::from_utf8_lossy(&data[header_end..]).to_string(),
    }
}
