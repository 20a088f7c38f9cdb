use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::BackendConfig;

/// The one failure kind the chat widget knows about. Every variant ends up
/// as the same apology bubble; the distinction only feeds the log.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("could not decode chat response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("chat response has no `response` field{}", server_said(.0))]
    MissingResponse(Option<String>),
}

fn server_said(error: &Option<String>) -> String {
    match error {
        Some(e) => format!(" (server said: {})", e),
        None => String::new(),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Anything that can answer a chat message.
pub trait ChatBackend: Send + Sync {
    fn send(&self, message: String) -> BoxFuture<'static, Result<String, ChatError>>;
}

#[derive(Clone)]
pub struct HttpChatBackend {
    chat_url: String,
    client: reqwest::Client,
}

impl HttpChatBackend {
    pub fn with_config(config: &BackendConfig) -> Result<Self, ChatError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(HttpChatBackend {
            chat_url: config.chat_url(),
            client: builder.build()?,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub async fn query(&self, message: &str) -> Result<String, ChatError> {
        log::debug!("POST {} ({} chars)", self.chat_url, message.len());

        // Status codes are not inspected: an error reply still carries a JSON
        // body, and it is the missing `response` field that makes it a failure.
        let response = self
            .client
            .post(&self.chat_url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        log::debug!("chat endpoint answered {} with {} bytes", status, body.len());

        parse_response(&body)
    }
}

impl ChatBackend for HttpChatBackend {
    fn send(&self, message: String) -> BoxFuture<'static, Result<String, ChatError>> {
        let backend = self.clone();
        Box::pin(async move { backend.query(&message).await })
    }
}

fn parse_response(body: &[u8]) -> Result<String, ChatError> {
    let parsed: ChatResponse = serde_json::from_slice(body)?;

    if let Some(source) = &parsed.source {
        log::debug!("response source: {}", source);
    }

    parsed.response.ok_or(ChatError::MissingResponse(parsed.error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpChatBackend {
        HttpChatBackend::with_config(&BackendConfig {
            url: server.uri(),
            chat_path: "/chat".to_string(),
            timeout_secs: Some(5),
        })
        .unwrap()
    }

    #[test]
    fn test_parse_response() {
        let text = parse_response(br#"{"response": "Hi there!", "source": "gemini"}"#).unwrap();
        assert_eq!(text, "Hi there!");
    }

    #[test]
    fn test_parse_response_missing_field() {
        let err = parse_response(br#"{"error": "No message provided"}"#).unwrap_err();
        match err {
            ChatError::MissingResponse(Some(e)) => assert_eq!(e, "No message provided"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(parse_response(b"{}").unwrap_err().to_string().contains("no `response` field"));
    }

    #[test]
    fn test_parse_response_invalid_json() {
        let err = parse_response(b"<html>Internal Server Error</html>").unwrap_err();
        assert!(matches!(err, ChatError::Decode(_)));
    }

    #[test]
    fn test_chat_url_joins_slashes() {
        let backend = HttpChatBackend::with_config(&BackendConfig {
            url: "http://localhost:5000/".to_string(),
            chat_path: "chat".to_string(),
            timeout_secs: None,
        })
        .unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:5000/chat");
    }

    #[tokio::test]
    async fn test_posts_message_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "message": "Hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "Hi there!",
                "source": "gemini"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = backend_for(&server).send("Hello".to_string()).await.unwrap();
        assert_eq!(reply, "Hi there!");
    }

    #[tokio::test]
    async fn test_error_status_without_response_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "No message provided" })),
            )
            .mount(&server)
            .await;

        let err = backend_for(&server).query("").await.unwrap_err();
        assert!(matches!(err, ChatError::MissingResponse(Some(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let backend = HttpChatBackend::with_config(&BackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            chat_path: "/chat".to_string(),
            timeout_secs: Some(2),
        })
        .unwrap();

        let err = backend.query("Hello").await.unwrap_err();
        assert!(matches!(err, ChatError::Network(_)));
    }
}
