//! HTTP bridge transport
//!
//! The browser session (login, page driving, anti-detection) lives in an
//! external automation process. This transport hands it one text at a time
//! over HTTP and maps its replies onto [`TranslateError`] classes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::TransportConfig;
use crate::error::{Result, TranslateError};
use crate::translator::{TranslationRequest, Translator};

/// Transport that posts requests to a browser-automation bridge
pub struct HttpBridgeTranslator {
    endpoint: String,
    quota_markers: Vec<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    source_lang: &'a str,
    target_lang: &'a str,
    text: &'a str,
}

/// A 200 reply carries either the translation or the bridge's own error.
#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default, alias = "translation")]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpBridgeTranslator {
    /// Create a bridge transport for `endpoint`
    pub fn new(endpoint: &str, quota_markers: Vec<String>) -> Result<Self> {
        let parsed = reqwest::Url::parse(endpoint)
            .map_err(|e| TranslateError::Config(format!("Invalid bridge URL {}: {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TranslateError::Config(format!(
                "Bridge URL must be http or https: {}",
                endpoint
            )));
        }

        Ok(Self {
            endpoint: endpoint.to_string(),
            quota_markers: quota_markers
                .into_iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            client: Client::new(),
        })
    }

    /// Create a bridge transport from the `[transport]` config section
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let endpoint = config.bridge_url.as_deref().ok_or_else(|| {
            TranslateError::Config(
                "No bridge_url configured. Set it with 'epub-translate config set-bridge-url <URL>' or --bridge-url".into(),
            )
        })?;
        Self::new(endpoint, config.quota_markers.clone())
    }

    /// Quota markers are matched against bridge diagnostics only, never
    /// against translated text.
    fn mentions_quota(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.quota_markers.iter().any(|m| body.contains(m.as_str()))
    }

    /// Map a non-success reply onto an error class
    fn classify(&self, status: StatusCode, body: String) -> TranslateError {
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), body.trim())
        };

        // 456 is the quota status DeepL's own API uses
        if matches!(status.as_u16(), 429 | 456) || self.mentions_quota(&body) {
            return TranslateError::QuotaExceeded(message);
        }
        if status.as_u16() == 408 || status.is_server_error() {
            TranslateError::Transient(message)
        } else {
            TranslateError::Rejected(message)
        }
    }
}

#[async_trait]
impl Translator for HttpBridgeTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        let body = BridgeRequest {
            source_lang: &request.source_lang,
            target_lang: &request.target_lang,
            text: &request.text,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslateError::Transient(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TranslateError::Transient(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(self.classify(status, text));
        }

        let parsed: BridgeResponse = serde_json::from_str(&text).map_err(|e| {
            TranslateError::Transient(format!("Failed to parse response: {}", e))
        })?;

        // The bridge scrapes the page, so a quota dialog can arrive as a 200
        if let Some(error) = parsed.error.filter(|e| !e.trim().is_empty()) {
            return Err(if self.mentions_quota(&error) {
                TranslateError::QuotaExceeded(error)
            } else {
                TranslateError::Transient(format!("Bridge error: {}", error))
            });
        }

        parsed
            .text
            .ok_or_else(|| TranslateError::Transient("Response carries no text".into()))
    }

    fn name(&self) -> &'static str {
        "HTTP bridge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn bridge() -> HttpBridgeTranslator {
        HttpBridgeTranslator::new(
            "http://127.0.0.1:9515/translate",
            vec!["Usage Limit".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(HttpBridgeTranslator::new("not a url", vec![]).is_err());
        assert!(HttpBridgeTranslator::new("ftp://example.com/x", vec![]).is_err());
    }

    #[test]
    fn test_from_config_requires_url() {
        let err = HttpBridgeTranslator::from_config(&TransportConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, TranslateError::Config(_)));
    }

    #[test]
    fn test_classify_quota_statuses() {
        let bridge = bridge();
        assert!(bridge.classify(StatusCode::TOO_MANY_REQUESTS, String::new()).is_quota());
        assert!(
            bridge
                .classify(StatusCode::from_u16(456).unwrap(), String::new())
                .is_quota()
        );
        assert!(
            bridge
                .classify(StatusCode::FORBIDDEN, "You reached the usage limit".into())
                .is_quota()
        );
    }

    #[test]
    fn test_classify_transient_and_rejected() {
        let bridge = bridge();
        assert!(
            bridge
                .classify(StatusCode::BAD_GATEWAY, "driver crashed".into())
                .is_retryable()
        );
        assert!(
            bridge
                .classify(StatusCode::GATEWAY_TIMEOUT, String::new())
                .is_retryable()
        );
        let rejected = bridge.classify(StatusCode::BAD_REQUEST, "bad lang".into());
        assert!(matches!(rejected, TranslateError::Rejected(_)));
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_response_accepts_translation_alias() {
        let parsed: BridgeResponse = serde_json::from_str(r#"{"translation": "Hallo"}"#).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("Hallo"));
        assert!(parsed.error.is_none());
    }

    /// Serve one canned reply on a local port; the task yields the request body.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/translate", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request_body(&mut socket).await;
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        (url, handle)
    }

    async fn read_request_body(socket: &mut TcpStream) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return String::new();
            }
            received.extend_from_slice(&buf[..n]);

            let Some(head_end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&received[..head_end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = head_end + 4;
            if received.len() >= body_start + length {
                return String::from_utf8_lossy(&received[body_start..body_start + length])
                    .into_owned();
            }
        }
    }

    fn local_bridge(url: &str) -> HttpBridgeTranslator {
        HttpBridgeTranslator {
            client: Client::builder().no_proxy().build().unwrap(),
            ..HttpBridgeTranslator::new(url, vec!["usage limit".to_string()]).unwrap()
        }
    }

    fn request(text: &str) -> TranslationRequest {
        TranslationRequest {
            source_lang: "ko".to_string(),
            target_lang: "en".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_translate_posts_request_and_returns_text() {
        let (url, server) = serve_once("200 OK", r#"{"text": "Hello"}"#).await;
        let translated = local_bridge(&url).translate(&request("안녕")).await.unwrap();
        assert_eq!(translated, "Hello");

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["source_lang"], "ko");
        assert_eq!(sent["target_lang"], "en");
        assert_eq!(sent["text"], "안녕");
    }

    #[tokio::test]
    async fn test_translated_text_mentioning_quota_is_success() {
        let (url, _server) = serve_once(
            "200 OK",
            r#"{"text": "She had hit the usage limit of her card."}"#,
        )
        .await;
        let translated = local_bridge(&url).translate(&request("x")).await.unwrap();
        assert_eq!(translated, "She had hit the usage limit of her card.");
    }

    #[tokio::test]
    async fn test_quota_status_from_server() {
        let (url, _server) = serve_once("456 Quota Exceeded", "").await;
        let err = local_bridge(&url).translate(&request("x")).await.unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let (url, _server) = serve_once("503 Service Unavailable", "driver restarting").await;
        let err = local_bridge(&url).translate(&request("x")).await.unwrap_err();
        assert!(matches!(err, TranslateError::Transient(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_bridge_error_field_on_success_status() {
        let (url, _server) =
            serve_once("200 OK", r#"{"error": "Usage limit reached for today"}"#).await;
        let err = local_bridge(&url).translate(&request("x")).await.unwrap_err();
        assert!(err.is_quota());

        let (url, _server) = serve_once("200 OK", r#"{"error": "stale element"}"#).await;
        let err = local_bridge(&url).translate(&request("x")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_transient() {
        let (url, _server) = serve_once("200 OK", "<html>captcha</html>").await;
        let err = local_bridge(&url).translate(&request("x")).await.unwrap_err();
        assert!(matches!(err, TranslateError::Transient(_)));
    }
}
