use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use changeprop_rules::RenderedRequest;

/// A raw HTTP result. Response bodies are opaque bytes unless
/// `decode_results` is set; decoding, if any, happens above this trait.
#[derive(Debug, Clone)]
pub struct HttpResult {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// The HTTP client collaborator: issues a request, returns
/// status/headers/body, does not follow redirects, does not auto-decode.
/// The engine depends only on this trait.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: &RenderedRequest) -> Result<HttpResult, String>;
}

/// `reqwest`-backed implementation: redirects disabled, a bounded timeout
/// so expiry becomes a retryable failure rather than a hang.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(request_timeout)
            .build()?;
        Ok(ReqwestHttpClient { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: &RenderedRequest) -> Result<HttpResult, String> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| format!("invalid method {}: {e}", request.method))?;
        let mut builder = self.client.request(method, &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResult { status, headers, body })
    }
}
