// src/auth/moltbook.rs
//! Client for Moltbook's "verify identity" endpoint.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::app_log;

const VERIFY_ENDPOINT: &str = "/api/v1/agents/verify-identity";
const APP_KEY_HEADER: &str = "X-Moltbook-App-Key";

/// Maximum retry attempts for transient errors (transport, 429, 5xx).
pub const MAX_RETRIES: u32 = 3;
/// Base delay for exponential backoff (doubles each retry).
pub const BASE_DELAY_MS: u64 = 500;
/// Upper bound on a `Retry-After` hint, so a sign-in never waits longer than this per retry.
pub const MAX_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoltbookOwner {
    #[serde(default)]
    pub x_handle: Option<String>,
    #[serde(default)]
    pub x_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoltbookAgent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub karma: i64,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub follower_count: i64,
    #[serde(default)]
    pub owner: Option<MoltbookOwner>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    agent: Option<MoltbookAgent>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Error, Debug)]
pub enum MoltbookError {
    #[error("Moltbook rejected the identity token: {0}")]
    InvalidToken(String),

    #[error("Moltbook app key is not configured")]
    NotConfigured,

    #[error("Moltbook returned status {status}: {body}")]
    Upstream {
        status: u16,
        body: String,
        retry_after: Option<u64>,
    },

    #[error("Moltbook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected Moltbook response: {0}")]
    Malformed(String),
}

impl MoltbookError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MoltbookError::Transport(_) => true,
            MoltbookError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            MoltbookError::Upstream { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Delay before retry number `attempt` (0-based). A server hint wins over the schedule.
pub fn backoff_delay(attempt: u32, retry_after: Option<u64>) -> Duration {
    match retry_after {
        Some(secs) => Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)),
        None => Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt)),
    }
}

/// Anything that can turn a Moltbook identity token into a verified agent.
#[rocket::async_trait]
pub trait AgentVerifier: Send + Sync {
    async fn verify_identity(&self, token: &str) -> Result<MoltbookAgent, MoltbookError>;
}

pub struct MoltbookClient {
    client: reqwest::Client,
    base_url: String,
    app_key: Option<String>,
}

impl MoltbookClient {
    pub fn new(base_url: &str, app_key: Option<String>, timeout_seconds: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_key,
        })
    }

    async fn verify_once(&self, app_key: &str, token: &str) -> Result<MoltbookAgent, MoltbookError> {
        let url = format!("{}{}", self.base_url, VERIFY_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .header(APP_KEY_HEADER, app_key)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;

        let status = response.status();
        app_log!(trace, "Moltbook verify status: {}", status);

        if matches!(status.as_u16(), 401 | 403 | 404) {
            let body = response.text().await.unwrap_or_default();
            return Err(MoltbookError::InvalidToken(body));
        }

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MoltbookError::Upstream {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        let parsed: VerifyResponse = response
            .json()
            .await
            .map_err(|e| MoltbookError::Malformed(e.to_string()))?;

        match (parsed.valid, parsed.agent) {
            (true, Some(agent)) => Ok(agent),
            (true, None) => Err(MoltbookError::Malformed(
                "valid response without agent".to_string(),
            )),
            (false, _) => Err(MoltbookError::InvalidToken(
                parsed.error.unwrap_or_else(|| "token not valid".to_string()),
            )),
        }
    }
}

#[rocket::async_trait]
impl AgentVerifier for MoltbookClient {
    async fn verify_identity(&self, token: &str) -> Result<MoltbookAgent, MoltbookError> {
        let app_key = self.app_key.as_deref().ok_or(MoltbookError::NotConfigured)?;
        let mut attempt = 0;

        loop {
            match self.verify_once(app_key, token).await {
                Ok(agent) => {
                    app_log!(info, "Moltbook verified agent {}", agent.name);
                    return Ok(agent);
                }
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let delay = backoff_delay(attempt, e.retry_after());
                    app_log!(
                        warn,
                        "Moltbook verify attempt {}/{} failed, retrying in {:?}: {}",
                        attempt + 1,
                        MAX_RETRIES,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn http_reply(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
            status,
            body.len(),
            extra_headers,
            body
        )
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// Local HTTP server answering the nth request with `replies[n]`, repeating the last one.
    async fn moltbook_stub(replies: Vec<String>) -> (MoltbookClient, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let reply = &replies[n.min(replies.len() - 1)];
                read_request(&mut socket).await;
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let client = MoltbookClient::new(&base_url, Some("app-key".into()), 5).unwrap();
        (client, hits)
    }

    fn upstream(status: u16) -> MoltbookError {
        MoltbookError::Upstream {
            status,
            body: String::new(),
            retry_after: None,
        }
    }

    #[test]
    fn test_retry_policy() {
        assert!(upstream(429).is_retryable());
        assert!(upstream(502).is_retryable());
        assert!(!upstream(400).is_retryable());
        assert!(!MoltbookError::InvalidToken("expired".into()).is_retryable());
        assert!(!MoltbookError::NotConfigured.is_retryable());
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(0, None), Duration::from_millis(500));
        assert_eq!(backoff_delay(1, None), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, None), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2, Some(7)), Duration::from_secs(7));
        assert_eq!(
            backoff_delay(0, Some(3600)),
            Duration::from_secs(MAX_RETRY_AFTER_SECS)
        );
    }

    #[test]
    fn test_agent_payload_defaults() {
        let agent: MoltbookAgent =
            serde_json::from_str(r#"{"id": "a1", "name": "clawd"}"#).unwrap();
        assert_eq!(agent.karma, 0);
        assert!(agent.owner.is_none());

        let parsed: VerifyResponse = serde_json::from_str(
            r#"{"success": true, "valid": true, "agent": {"id": "a1", "name": "clawd", "karma": 420, "owner": {"x_handle": "human"}}}"#,
        )
        .unwrap();
        let agent = parsed.agent.unwrap();
        assert_eq!(agent.karma, 420);
        assert_eq!(agent.owner.unwrap().x_handle.as_deref(), Some("human"));
    }

    #[tokio::test]
    async fn test_missing_app_key_fails_fast() {
        let client = MoltbookClient::new("http://127.0.0.1:9", None, 1).unwrap();
        let err = client.verify_identity("token").await.unwrap_err();
        assert!(matches!(err, MoltbookError::NotConfigured));
    }

    #[tokio::test]
    async fn test_rejected_token_is_not_retried() {
        let (client, hits) = moltbook_stub(vec![http_reply(
            "401 Unauthorized",
            "",
            r#"{"error":"expired"}"#,
        )])
        .await;

        let err = client.verify_identity("token").await.unwrap_err();
        assert!(matches!(err, MoltbookError::InvalidToken(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_false_is_invalid_token() {
        let (client, hits) = moltbook_stub(vec![http_reply(
            "200 OK",
            "",
            r#"{"valid":false,"error":"revoked"}"#,
        )])
        .await;

        let err = client.verify_identity("token").await.unwrap_err();
        match err {
            MoltbookError::InvalidToken(reason) => assert_eq!(reason, "revoked"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_stop_after_max_retries() {
        let (client, hits) = moltbook_stub(vec![http_reply(
            "503 Service Unavailable",
            "Retry-After: 0\r\n",
            r#"{"error":"maintenance"}"#,
        )])
        .await;

        let err = client.verify_identity("token").await.unwrap_err();
        assert!(matches!(
            err,
            MoltbookError::Upstream {
                status: 503,
                retry_after: Some(0),
                ..
            }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), MAX_RETRIES as usize + 1);
    }

    #[tokio::test]
    async fn test_rate_limited_waits_for_hint_then_succeeds() {
        let (client, hits) = moltbook_stub(vec![
            http_reply("429 Too Many Requests", "Retry-After: 1\r\n", "{}"),
            http_reply(
                "200 OK",
                "",
                r#"{"valid":true,"agent":{"id":"mb-1","name":"clawd","karma":420}}"#,
            ),
        ])
        .await;

        let started = std::time::Instant::now();
        let agent = client.verify_identity("token").await.unwrap();
        assert_eq!(agent.name, "clawd");
        assert_eq!(agent.karma, 420);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
