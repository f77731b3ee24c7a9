//! Range-aware mock media server used by the unit tests.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::net::TcpListener;

use crate::catalog::{Media, MediaItem, RemotePart};
use crate::remote::RemoteStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub path: String,
    pub range: Option<String>,
}

/// How a body ends after its head bytes were sent.
#[derive(Debug, Clone, Copy)]
enum Cut {
    Reset,
    Stall,
}

#[derive(Default)]
struct MockState {
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<Recorded>>,
    last_token: Mutex<Option<String>>,
    ignore_range: AtomicBool,
    fail_next: AtomicU32,
    cut: Mutex<Option<(usize, Cut)>>,
}

pub struct MockRemote {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockRemote {
    pub const TOKEN: &'static str = "test-token";

    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .fallback(serve_part)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockRemote { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn store(&self) -> RemoteStore {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        RemoteStore::with_client(client, &self.base_url(), Self::TOKEN)
    }

    pub fn put(&self, path: &str, content: Vec<u8>) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), content);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.state.requests.lock().unwrap().clear();
    }

    pub fn last_token(&self) -> Option<String> {
        self.state.last_token.lock().unwrap().clone()
    }

    /// Serve full bodies with `200 OK` even when a range was requested.
    pub fn set_ignore_range(&self, ignore: bool) {
        self.state.ignore_range.store(ignore, Ordering::SeqCst);
    }

    /// Answer the next `n` requests with `503`.
    pub fn fail_next(&self, n: u32) {
        self.state.fail_next.store(n, Ordering::SeqCst);
    }

    /// Send headers and `n` body bytes, then reset the connection.
    pub fn truncate_after(&self, n: Option<usize>) {
        *self.state.cut.lock().unwrap() = n.map(|n| (n, Cut::Reset));
    }

    /// Send headers and `n` body bytes, then never send anything else.
    pub fn stall_after(&self, n: usize) {
        *self.state.cut.lock().unwrap() = Some((n, Cut::Stall));
    }
}

fn parse_range(value: &str, len: usize) -> Option<Result<(usize, usize), ()>> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    if start >= len {
        return Some(Err(()));
    }
    let end = if end.is_empty() {
        len
    } else {
        (end.parse::<usize>().ok()? + 1).min(len)
    };
    Some(Ok((start, end)))
}

async fn serve_part(State(state): State<Arc<MockState>>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.last_token.lock().unwrap() = headers
        .get("x-plex-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push(Recorded {
        path: path.clone(),
        range: range.clone(),
    });

    if state
        .fail_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let Some(content) = state.files.lock().unwrap().get(&path).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let range = range.filter(|_| !state.ignore_range.load(Ordering::SeqCst));
    let (status, body) = match range.and_then(|r| parse_range(&r, content.len())) {
        Some(Ok((start, end))) => (StatusCode::PARTIAL_CONTENT, content[start..end].to_vec()),
        Some(Err(())) => return StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        None => (StatusCode::OK, content),
    };

    let cut = *state.cut.lock().unwrap();
    match cut {
        Some((limit, cut)) if limit < body.len() => {
            let head = Bytes::from(body[..limit].to_vec());
            // the pause lets headers and head reach the client before the cut
            let tail: BoxStream<'static, Result<Bytes, io::Error>> = match cut {
                Cut::Reset => stream::once(async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Err(io::Error::new(io::ErrorKind::ConnectionReset, "mock reset"))
                })
                .boxed(),
                Cut::Stall => stream::pending().boxed(),
            };
            let chunks = stream::once(async move { Ok::<_, io::Error>(head) }).chain(tail);
            (status, Body::from_stream(chunks)).into_response()
        }
        _ => (status, body).into_response(),
    }
}

/// Deterministic, non-repeating-looking content of `len` bytes.
pub fn content(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 31 + i / 251) as u8).wrapping_add(seed))
        .collect()
}

pub fn part(key: &str, file: &str, size: usize) -> RemotePart {
    RemotePart {
        remote_key: key.to_string(),
        declared_size: size as u64,
        source_path: file.to_string(),
    }
}

pub fn item(title: &str, parts: Vec<RemotePart>) -> MediaItem {
    MediaItem {
        title: title.to_string(),
        section_title: "Movies".to_string(),
        section_locations: vec!["/data/movies".to_string()],
        media: vec![Media { parts }],
    }
}

#[cfg(test)]
mod tests {
    use super::parse_range;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=2-", 10), Some(Ok((2, 10))));
        assert_eq!(parse_range("bytes=0-3", 10), Some(Ok((0, 4))));
        assert_eq!(parse_range("bytes=0-99", 10), Some(Ok((0, 10))));
        assert_eq!(parse_range("bytes=10-", 10), Some(Err(())));
        assert_eq!(parse_range("items=0-1", 10), None);
    }
}
