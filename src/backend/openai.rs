//! Backend for OpenAI-compatible chat APIs.
//!
//! Endpoint: `{base}/v1/chat/completions`. The story is requested as a
//! single user-role message and read back from `choices[0].message.content`.

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use comic_pipeline::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new();
/// let with_key = OpenAiBackend::new().with_api_key("sk-...");
/// assert!(with_key.has_api_key());
/// ```
#[derive(Clone, Default)]
pub struct OpenAiBackend {
    /// Optional API key. If set, sent as `Authorization: Bearer {key}`.
    pub(crate) api_key: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_key", &self.api_key.as_deref().map(redact_key))
            .finish()
    }
}

/// Keep a short prefix of a secret for identification.
pub(crate) fn redact_key(key: &str) -> String {
    match key.char_indices().nth(6) {
        Some((idx, _)) => format!("{}***", &key[..idx]),
        None => "***".to_string(),
    }
}

/// Parse a `Retry-After` header value as seconds.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend without authentication.
    pub fn new() -> Self {
        Self { api_key: None }
    }

    /// Set the API key for authentication. Blank keys are ignored.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the request body for `/v1/chat/completions`.
    fn build_body(request: &LlmRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
            "stream": false,
        });

        if request.config.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        body
    }

    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client.post(url).json(body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Extract the generated text; missing content reads as empty.
    fn extract_text(json_resp: &Value) -> String {
        json_resp
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let meta: serde_json::Map<String, Value> = ["usage", "model", "id"]
            .iter()
            .filter_map(|k| json_resp.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect();
        (!meta.is_empty()).then_some(Value::Object(meta))
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
        let body = Self::build_body(request);

        let resp = self
            .build_http_request(client, &url, &body)
            .send()
            .await
            .map_err(|e| {
                PipelineError::Other(format!("Failed to connect to LLM at {}: {}", url, e))
            })?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError {
                status,
                body: text,
                retry_after,
            });
        }

        let json_resp: Value = resp.json().await?;

        Ok(LlmResponse {
            text: Self::extract_text(&json_resp),
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LlmConfig;

    fn test_request() -> LlmRequest {
        LlmRequest {
            model: "gpt-4o-mini".into(),
            prompt: "Write a comic about a knight.".into(),
            config: LlmConfig::default(),
        }
    }

    #[test]
    fn test_body_has_single_user_message() {
        let body = OpenAiBackend::build_body(&test_request());

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], false);
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Write a comic about a knight.");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_body_json_mode() {
        let mut request = test_request();
        request.config.json_mode = true;
        let body = OpenAiBackend::build_body(&request);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_extract_text() {
        let resp = json!({"choices": [{"message": {"role": "assistant", "content": "{}"}}]});
        assert_eq!(OpenAiBackend::extract_text(&resp), "{}");
        assert_eq!(OpenAiBackend::extract_text(&json!({"choices": []})), "");
    }

    #[test]
    fn test_extract_metadata() {
        let resp = json!({"id": "chatcmpl-1", "usage": {"total_tokens": 10}, "choices": []});
        let meta = OpenAiBackend::extract_metadata(&resp).expect("metadata");
        assert_eq!(meta["id"], "chatcmpl-1");
        assert!(OpenAiBackend::extract_metadata(&json!({})).is_none());
    }

    #[test]
    fn test_auth_header() {
        let backend = OpenAiBackend::new().with_api_key("sk-test123");
        let req = backend
            .build_http_request(&Client::new(), "https://api.example.com/v1/chat/completions", &json!({}))
            .build()
            .expect("build request");
        assert_eq!(req.headers().get("Authorization").expect("auth"), "Bearer sk-test123");
    }

    #[test]
    fn test_blank_key_is_ignored() {
        let backend = OpenAiBackend::new().with_api_key("  ");
        assert!(!backend.has_api_key());
        let req = backend
            .build_http_request(&Client::new(), "https://api.example.com/v1/chat/completions", &json!({}))
            .build()
            .expect("build request");
        assert!(req.headers().get("Authorization").is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let backend = OpenAiBackend::new().with_api_key("sk-1234567890abcdef");
        let debug_output = format!("{:?}", backend);
        assert!(!debug_output.contains("1234567890abcdef"));
        assert!(debug_output.contains("sk-123***"));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
