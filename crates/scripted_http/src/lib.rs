//! Scripted local HTTP/1.1 server for transport and end-to-end tests.
//!
//! Responses are scripted per `METHOD path` route and served with chunked transfer
//! encoding, optionally delayed per chunk so tests can observe mid-stream state.
//! Every request is recorded (method, path, lowercased headers, body).

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone)]
pub struct ResponseChunk {
    pub delay_ms: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Respond {
        status: u16,
        content_type: &'static str,
        chunks: Vec<ResponseChunk>,
    },
    /// Close the socket without writing a response.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

type RouteTable = HashMap<(String, String), VecDeque<ScriptedResponse>>;

#[derive(Debug, Default)]
pub struct ScriptedServerBuilder {
    routes: RouteTable,
}

impl ScriptedServerBuilder {
    /// Queues a response for `method path`. When a route has a single response left
    /// it is replayed for every later request.
    #[must_use]
    pub fn route(mut self, method: &str, path: &str, response: ScriptedResponse) -> Self {
        self.routes
            .entry((method.to_ascii_uppercase(), path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub async fn start(self) -> ScriptedServer {
        ScriptedServer::start(self.routes).await
    }
}

pub struct ScriptedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    #[must_use]
    pub fn builder() -> ScriptedServerBuilder {
        ScriptedServerBuilder::default()
    }

    async fn start(routes: RouteTable) -> Self {
        let routes = Arc::new(Mutex::new(routes));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let routes = Arc::clone(&routes);
            let requests = Arc::clone(&requests);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let routes = Arc::clone(&routes);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        serve_one(socket, routes, requests).await;
                    });
                }
            }
        });

        Self {
            base_url,
            requests,
            handle,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method.eq_ignore_ascii_case(method) && request.path == path)
            .collect()
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[must_use]
pub fn response_sse(status: u16, frames: &[&str]) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "text/event-stream",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: sse_frames(frames),
        }],
    }
}

/// SSE response whose frames are flushed one by one, `delay_ms` apart.
#[must_use]
pub fn response_sse_paced(status: u16, frames: &[&str], delay_ms: u64) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "text/event-stream",
        chunks: frames
            .iter()
            .enumerate()
            .map(|(index, frame)| ResponseChunk {
                delay_ms: if index == 0 { 0 } else { delay_ms },
                bytes: sse_frames(&[frame]),
            })
            .collect(),
    }
}

#[must_use]
pub fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "application/json",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: body.as_bytes().to_vec(),
        }],
    }
}

#[must_use]
pub fn sse_frames(frames: &[&str]) -> Vec<u8> {
    let mut body = String::new();

    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }

    body.into_bytes()
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

fn next_response(routes: &Mutex<RouteTable>, method: &str, path: &str) -> ScriptedResponse {
    let mut routes = lock_unpoisoned(routes);
    let Some(queue) = routes.get_mut(&(method.to_string(), path.to_string())) else {
        return response_json(404, r##"{"error":"unexpected request"}"##);
    };

    if queue.len() > 1 {
        if let Some(response) = queue.pop_front() {
            return response;
        }
    }

    queue
        .front()
        .cloned()
        .unwrap_or_else(|| response_json(404, r##"{"error":"unexpected request"}"##))
}

async fn serve_one(
    mut socket: TcpStream,
    routes: Arc<Mutex<RouteTable>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let Ok(Some(request)) = read_request(&mut socket).await else {
        return;
    };

    let response = next_response(&routes, &request.method, &request.path);
    lock_unpoisoned(&requests).push(request);

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Respond {
            status,
            content_type,
            chunks,
        } => {
            let headers = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                status_reason(status),
                content_type,
            );

            if socket.write_all(headers.as_bytes()).await.is_err() {
                return;
            }

            for chunk in chunks {
                if chunk.delay_ms > 0 {
                    sleep(Duration::from_millis(chunk.delay_ms)).await;
                }
                if chunk.bytes.is_empty() {
                    continue;
                }
                let prefix = format!("{:X}\r\n", chunk.bytes.len());
                if socket.write_all(prefix.as_bytes()).await.is_err() {
                    return;
                }
                if socket.write_all(&chunk.bytes).await.is_err() {
                    return;
                }
                if socket.write_all(b"\r\n").await.is_err() {
                    return;
                }
                if socket.flush().await.is_err() {
                    return;
                }
            }

            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Option<RecordedRequest>> {
    let mut raw = Vec::new();
    let mut buffer = [0_u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(None);
        }
        raw.extend_from_slice(&buffer[..n]);
        if let Some(position) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_ascii_uppercase();
    let path = request_line.next().unwrap_or_default().to_string();

    let headers: BTreeMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = raw[header_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buffer[..n]);
    }
    body.truncate(content_length);

    Ok(Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    }))
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
