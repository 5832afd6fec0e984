use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::api::{ChatMessage, ChatRequest};
use crate::core::config::io::ConfigError;
use crate::core::preferences::{PreferenceError, PreferenceStore};
use crate::core::provider::{CompletionProvider, ProviderError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sets environment variables for the lifetime of the guard and restores the
/// previous values on drop.
pub struct TestEnvVarGuard {
    saved: Vec<(String, Option<String>)>,
}

impl TestEnvVarGuard {
    pub fn new() -> Self {
        Self { saved: Vec::new() }
    }

    pub fn set_var(&mut self, key: &str, value: &str) {
        self.saved.push((key.to_string(), std::env::var(key).ok()));
        std::env::set_var(key, value);
    }

    pub fn remove_var(&mut self, key: &str) {
        self.saved.push((key.to_string(), std::env::var(key).ok()));
        std::env::remove_var(key);
    }
}

impl Drop for TestEnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Scripted reply for [`MockProvider`].
pub enum MockReply {
    Reply(&'static str),
    Fail(ProviderError),
}

/// Records every request and answers from a script. When the script runs
/// out it replies with "ok". With a gate set, each call waits for
/// [`MockProvider::release`] before answering.
#[derive(Default)]
pub struct MockProvider {
    requests: Mutex<Vec<ChatRequest>>,
    script: Mutex<VecDeque<MockReply>>,
    gate: Option<Arc<Notify>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replying(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn gated(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::replying(replies)
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatMessage, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(MockReply::Reply(content)) => Ok(ChatMessage::new("assistant", content)),
            Some(MockReply::Fail(err)) => Err(err),
            None => Ok(ChatMessage::new("assistant", "ok")),
        }
    }
}

/// Accepts the first `successes` writes, then fails every later one the way
/// an unwritable config directory would. Reads always come back empty.
pub struct FailingPreferenceStore {
    successes: usize,
    attempts: AtomicUsize,
}

impl FailingPreferenceStore {
    pub fn failing_after(successes: usize) -> Self {
        Self {
            successes,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PreferenceStore for FailingPreferenceStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), PreferenceError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.successes {
            Ok(())
        } else {
            Err(PreferenceError::Config(ConfigError::NoConfigDir))
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

/// Keep reqwest from routing loopback test traffic through a proxy.
pub fn bypass_proxies() -> TestEnvVarGuard {
    let mut guard = TestEnvVarGuard::new();
    for key in [
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        guard.remove_var(key);
    }
    guard.set_var("NO_PROXY", "*");
    guard.set_var("no_proxy", "*");
    guard
}

/// Serve one canned `(status, body)` response per connection and return the
/// requests that were received.
pub async fn spawn_mock_server(
    responses: Vec<(u16, String)>,
) -> (String, JoinHandle<Result<Vec<CapturedRequest>, String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");

    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
            captured.push(read_http_request(&mut stream).await?);

            let reason = match status {
                200 => "OK",
                401 => "Unauthorized",
                429 => "Too Many Requests",
                500 => "Internal Server Error",
                _ => "Status",
            };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream
                .write_all(response.as_bytes())
                .await
                .map_err(|err| err.to_string())?;
            stream.shutdown().await.map_err(|err| err.to_string())?;
        }
        Ok(captured)
    });

    (format!("http://{addr}/api/v1"), handle)
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let header_end = loop {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(index) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break index + 4;
        }
    };

    let header_text = std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
