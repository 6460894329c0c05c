//! Backend for MiniMax-style image generation APIs.
//!
//! Endpoint: `{base}/v1/image_generation`. A call succeeds only when the
//! provider reports `base_resp.status_code == 0` and returns at least one
//! non-empty URL in `data.image_urls`.

use super::{ImageBackend, ImageRequest};
use crate::backend::openai::{parse_retry_after, redact_key};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    prompt: &'a str,
    width: u32,
    height: u32,
    response_format: &'a str,
    n: u32,
    prompt_optimizer: bool,
}

impl<'a> From<&'a ImageRequest> for RequestBody<'a> {
    fn from(req: &'a ImageRequest) -> Self {
        Self {
            model: &req.model,
            prompt: &req.prompt,
            width: req.width,
            height: req.height,
            response_format: &req.response_format,
            n: req.n,
            prompt_optimizer: req.prompt_optimizer,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    base_resp: Option<BaseResp>,
    #[serde(default)]
    data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
struct BaseResp {
    status_code: i64,
    #[serde(default)]
    status_msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseData {
    #[serde(default)]
    image_urls: Vec<String>,
}

/// HTTP image backend speaking the MiniMax `image_generation` protocol.
#[derive(Clone, Default)]
pub struct MiniMaxBackend {
    pub(crate) api_key: Option<String>,
}

impl std::fmt::Debug for MiniMaxBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniMaxBackend")
            .field("api_key", &self.api_key.as_deref().map(redact_key))
            .finish()
    }
}

impl MiniMaxBackend {
    pub fn new() -> Self {
        Self { api_key: None }
    }

    /// Set the API key, sent as `Authorization: Bearer {key}`. Blank keys are ignored.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    /// Pull the first image URL out of a decoded response.
    fn first_url(body: ResponseBody) -> Result<String> {
        match body.base_resp {
            Some(BaseResp { status_code: 0, .. }) => {}
            Some(BaseResp {
                status_code,
                status_msg,
            }) => {
                return Err(PipelineError::StageFailed {
                    stage: "image".into(),
                    message: format!(
                        "provider status {}: {}",
                        status_code,
                        status_msg.unwrap_or_default()
                    ),
                })
            }
            None => {
                return Err(PipelineError::StageFailed {
                    stage: "image".into(),
                    message: "response has no base_resp".into(),
                })
            }
        }

        body.data
            .unwrap_or_default()
            .image_urls
            .into_iter()
            .next()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| PipelineError::EmptyOutput("image response has no URL".into()))
    }
}

#[async_trait]
impl ImageBackend for MiniMaxBackend {
    async fn generate(
        &self,
        client: &Client,
        base_url: &str,
        request: &ImageRequest,
    ) -> Result<String> {
        let url = format!("{}/v1/image_generation", base_url.trim_end_matches('/'));

        let mut req = client.post(&url).json(&RequestBody::from(request));
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
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

        let body: ResponseBody = resp.json().await?;
        Self::first_url(body)
    }

    fn name(&self) -> &'static str {
        "minimax"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> ResponseBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let req = ImageRequest::new("image-01", "a knight at dawn");
        let body = serde_json::to_value(RequestBody::from(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "image-01",
                "prompt": "a knight at dawn",
                "width": 512,
                "height": 512,
                "response_format": "url",
                "n": 1,
                "prompt_optimizer": true,
            })
        );
    }

    #[test]
    fn test_first_url_success() {
        let body = decode(json!({
            "base_resp": {"status_code": 0, "status_msg": "success"},
            "data": {"image_urls": ["https://cdn.example/1.png", "https://cdn.example/2.png"]}
        }));
        assert_eq!(MiniMaxBackend::first_url(body).unwrap(), "https://cdn.example/1.png");
    }

    #[test]
    fn test_nonzero_status_code_is_error() {
        let body = decode(json!({
            "base_resp": {"status_code": 1002, "status_msg": "rate limit"},
            "data": {"image_urls": ["https://cdn.example/1.png"]}
        }));
        let err = MiniMaxBackend::first_url(body).unwrap_err();
        assert!(err.to_string().contains("1002"));
    }

    #[test]
    fn test_missing_base_resp_is_error() {
        let body = decode(json!({"data": {"image_urls": ["https://cdn.example/1.png"]}}));
        assert!(MiniMaxBackend::first_url(body).is_err());
    }

    #[test]
    fn test_empty_url_list_is_error() {
        let body = decode(json!({"base_resp": {"status_code": 0}, "data": {"image_urls": []}}));
        assert!(matches!(
            MiniMaxBackend::first_url(body),
            Err(PipelineError::EmptyOutput(_))
        ));

        let body = decode(json!({"base_resp": {"status_code": 0}, "data": {"image_urls": [""]}}));
        assert!(MiniMaxBackend::first_url(body).is_err());

        let body = decode(json!({"base_resp": {"status_code": 0}}));
        assert!(MiniMaxBackend::first_url(body).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let backend = MiniMaxBackend::new().with_api_key("mm-abcdefghijkl");
        let out = format!("{:?}", backend);
        assert!(!out.contains("ghijkl"));
        assert!(out.contains("mm-abc***"));
    }
}
