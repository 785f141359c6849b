//! In-process HTTP stub serving canned listing pages by `?page=N`.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub struct StubSite {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<usize>>>,
}

impl StubSite {
    pub async fn start(pages: Vec<String>) -> Self {
        Self::start_with_latency(pages, Duration::ZERO).await
    }

    /// Pages not in `pages` answer 404. Every response waits `latency` first.
    pub async fn start_with_latency(pages: Vec<String>, latency: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pages = Arc::new(pages);

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let pages = Arc::clone(&pages);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = sock.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let head = String::from_utf8_lossy(&buf[..read]);
                    let page = page_param(&head);
                    if let Some(p) = page {
                        log.lock().unwrap().push(p);
                    }

                    tokio::time::sleep(latency).await;
                    let (status, body) = match page.and_then(|p| pages.get(p)) {
                        Some(body) => ("200 OK", body.as_str()),
                        None => ("404 Not Found", ""),
                    };
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = sock.write_all(response.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}/product/all", self.addr)
    }

    /// Page indexes requested so far, in arrival order.
    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

fn page_param(head: &str) -> Option<usize> {
    let target = head.lines().next()?.split_whitespace().nth(1)?;
    let (_, query) = target.split_once('?')?;
    query
        .split('&')
        .find_map(|kv| kv.strip_prefix("page="))?
        .parse()
        .ok()
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
}
