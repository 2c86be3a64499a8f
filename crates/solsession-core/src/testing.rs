//! Shared test fixtures: unsigned token minting, a scripted backend, a
//! recording navigator and a minimal HTTP server for client tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::api::AuthBackend;
use crate::auth::{Navigator, Role, SessionStore, StoreKey, Surface};
use crate::models::{TokenResponse, UserProfile};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn mint_token_with_payload(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

/// Token in the backend's shape: roles as `{"authority": ...}` objects
pub fn mint_token(subject: &str, roles: &[&str], exp: i64) -> String {
    let roles: Vec<_> = roles
        .iter()
        .map(|r| serde_json::json!({ "authority": r }))
        .collect();
    mint_token_with_payload(serde_json::json!({
        "sub": subject,
        "role": roles,
        "email": subject,
        "exp": exp,
    }))
}

pub fn sample_profile(role: Role) -> UserProfile {
    UserProfile {
        id: 1,
        display_name: "Awa Diallo".to_string(),
        email: "a@b.com".to_string(),
        role,
        active: true,
        date_creation: None,
        date_modification: None,
    }
}

pub fn token_response(access: &str, refresh: &str, roles: &[&str]) -> TokenResponse {
    TokenResponse {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: Some("Bearer".to_string()),
        id: Some(1),
        display_name: Some("Awa Diallo".to_string()),
        email: Some("a@b.com".to_string()),
        message: None,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

/// Scripted backend with call recording.
#[derive(Default)]
pub struct MockBackend {
    store: Mutex<Option<Arc<dyn SessionStore>>>,
    login_response: Mutex<Option<TokenResponse>>,
    renewals: Mutex<VecDeque<Result<TokenResponse, String>>>,
    profile: Mutex<Option<UserProfile>>,
    logout_fails: AtomicBool,
    renew_delay_ms: AtomicU64,
    profile_delay_ms: AtomicU64,
    renew_calls: AtomicUsize,
    logins: Mutex<Vec<(String, String)>>,
    code_logins: Mutex<Vec<(String, String)>>,
    renewal_tokens: Mutex<Vec<String>>,
    profile_tokens: Mutex<Vec<Option<String>>>,
    logout_tokens: Mutex<Vec<Option<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the mock see which access token a real client would attach
    pub fn attach_store(&self, store: Arc<dyn SessionStore>) {
        *self.store.lock() = Some(store);
    }

    pub fn set_login_response(&self, response: TokenResponse) {
        *self.login_response.lock() = Some(response);
    }

    pub fn push_renewal(&self, outcome: Result<TokenResponse, String>) {
        self.renewals.lock().push_back(outcome);
    }

    pub fn set_profile(&self, profile: UserProfile) {
        *self.profile.lock() = Some(profile);
    }

    pub fn set_logout_fails(&self, fails: bool) {
        self.logout_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_renew_delay_ms(&self, ms: u64) {
        self.renew_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_profile_delay_ms(&self, ms: u64) {
        self.profile_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn renew_calls(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_tokens.lock().len()
    }

    pub fn login_credentials(&self) -> Vec<(String, String)> {
        self.logins.lock().clone()
    }

    pub fn code_logins(&self) -> Vec<(String, String)> {
        self.code_logins.lock().clone()
    }

    pub fn renewal_tokens(&self) -> Vec<String> {
        self.renewal_tokens.lock().clone()
    }

    pub fn profile_tokens(&self) -> Vec<Option<String>> {
        self.profile_tokens.lock().clone()
    }

    pub fn logout_tokens(&self) -> Vec<Option<String>> {
        self.logout_tokens.lock().clone()
    }

    fn stored_access_token(&self) -> Option<String> {
        self.store
            .lock()
            .as_ref()
            .and_then(|s| s.get(StoreKey::AuthToken))
    }

    fn login_outcome(&self) -> Result<TokenResponse> {
        self.login_response
            .lock()
            .clone()
            .ok_or_else(|| anyhow!("invalid credentials"))
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn authenticate(&self, email: &str, password: &str) -> Result<TokenResponse> {
        self.logins.lock().push((email.to_string(), password.to_string()));
        self.login_outcome()
    }

    async fn authenticate_with_code(&self, email: &str, code: &str) -> Result<TokenResponse> {
        self.code_logins.lock().push((email.to_string(), code.to_string()));
        self.login_outcome()
    }

    async fn renew(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        self.renewal_tokens.lock().push(refresh_token.to_string());
        let delay = self.renew_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        let outcome = self.renewals.lock().pop_front();
        match outcome {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no renewal scripted")),
        }
    }

    async fn fetch_profile(&self) -> Result<UserProfile> {
        let token = self.stored_access_token();
        self.profile_tokens.lock().push(token);
        let delay = self.profile_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        let profile = self.profile.lock().clone();
        profile.ok_or_else(|| anyhow!("profile unavailable"))
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<()> {
        self.logout_tokens.lock().push(access_token.map(str::to_string));
        if self.logout_fails.load(Ordering::SeqCst) {
            return Err(anyhow!("backend down"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Surface>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<Surface> {
        self.visited.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, surface: Surface) {
        self.visited.lock().push(surface);
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// One-connection-per-request HTTP/1.1 server answering from a script.
pub struct FakeServer {
    addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                recorded.lock().push(request);
                let reply = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let mut authorization = None;
    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "authorization" => authorization = Some(value.trim().to_string()),
            "content-length" => content_length = value.trim().parse().unwrap_or(0),
            _ => {}
        }
    }

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..]).to_string();

    Some(RecordedRequest {
        method,
        path,
        authorization,
        body,
    })
}
