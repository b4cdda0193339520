//! Shared utilities for integration tests: a server on an ephemeral port and a
//! raw TCP client that speaks just enough HTTP/1.1 to read our responses.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_std::future;
use async_std::io::BufReader;
use async_std::net::TcpStream;
use async_std::prelude::*;
use async_std::task;

use keelhttp::config::ServerConfig;
use keelhttp::handler::codec::Codec;
use keelhttp::handler::router::RouteTable;
use keelhttp::net::rate_limit::RateLimiter;
use keelhttp::net::server::Server;

pub fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        max_connections: 4,
        request_timeout: Duration::from_secs(2),
        content_type: "text/plain".to_string(),
        base_path: "/food".to_string(),
        ..ServerConfig::default()
    }
}

/// Starts a server in the background and returns its address and rate limiter.
pub async fn start(
    config: ServerConfig,
    routes: RouteTable,
    codec: Arc<dyn Codec>,
) -> (SocketAddr, Arc<RateLimiter>) {
    let server = Server::bind(config, routes, codec).await.unwrap();
    let addr = server.local_addr().unwrap();
    let limiter = server.rate_limiter();
    task::spawn(server.run());
    (addr, limiter)
}

#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

#[allow(dead_code)]
impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            reader: BufReader::new(stream.clone()),
            writer: stream,
        }
    }

    pub async fn send(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
    }

    /// `GET` with a Host header and nothing else.
    pub async fn get(&mut self, target: &str) -> Reply {
        self.send(&format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
            .await;
        self.reply().await
    }

    pub async fn reply(&mut self) -> Reply {
        future::timeout(Duration::from_secs(5), self.read_reply())
            .await
            .expect("no response within 5s")
    }

    async fn read_reply(&mut self) -> Reply {
        let mut status_line = String::new();
        self.reader.read_line(&mut status_line).await.unwrap();
        let status_line = status_line.trim_end_matches("\r\n");
        assert!(!status_line.is_empty(), "connection closed before a response");

        let mut parts = status_line.splitn(3, ' ');
        assert_eq!(parts.next(), Some("HTTP/1.1"));
        let status = parts.next().unwrap().parse().unwrap();
        let reason = parts.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            let line = line.trim_end_matches("\r\n");
            if line.is_empty() {
                break;
            }
            let (k, v) = line.split_once(": ").unwrap();
            headers.push((k.to_string(), v.to_string()));
        }

        let len: usize = headers
            .iter()
            .find(|(k, _)| k == "Content-Length")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap_or(0);
        let mut body = vec![0; len];
        self.reader.read_exact(&mut body).await.unwrap();

        Reply {
            status,
            reason,
            headers,
            body: String::from_utf8(body).unwrap(),
        }
    }

    /// True once the server has closed its side of the connection.
    pub async fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 64];
        match future::timeout(Duration::from_secs(5), self.reader.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => true,
            Ok(Ok(_)) | Err(_) => false,
        }
    }
}
