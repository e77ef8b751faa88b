//! HTTP client for the venue REST API.
//!
//! Wraps `reqwest` with request signing and response handling. Upstream
//! failures (status >= 300) and Binance `{code, msg}` error bodies are
//! mapped into the feed error taxonomy.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::signer::{build_query_string, RequestSigner};
use crate::error::{FeedError, FeedResult};

/// HTTP client with automatic signing for authenticated endpoints.
pub struct HttpClient {
    client: Client,
    base_url: String,
    signer: Arc<dyn RequestSigner>,
    recv_window_ms: u64,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(
        base_url: impl Into<String>,
        signer: Arc<dyn RequestSigner>,
        timeout: Duration,
        recv_window_ms: u64,
    ) -> FeedResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| FeedError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            signer,
            recv_window_ms,
        })
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn build_url(&self, endpoint: &str, params: &[(String, String)]) -> String {
        let base = format!("{}{}", self.base_url, endpoint);
        if params.is_empty() {
            base
        } else {
            format!("{}?{}", base, build_query_string(params))
        }
    }

    fn sign_params(&self, params: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut signed: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if !signed.iter().any(|(k, _)| k == "recvWindow") {
            signed.push(("recvWindow".to_string(), self.recv_window_ms.to_string()));
        }

        self.signer.sign(&mut signed, Self::timestamp_ms());
        signed
    }

    fn auth_headers(&self) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(self.signer.api_key_header().as_bytes()),
            header::HeaderValue::from_str(self.signer.api_key()),
        ) {
            headers.insert(name, value);
        }
        headers
    }

    /// Make a public (unsigned) GET request.
    pub async fn get_public<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> FeedResult<T> {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let url = self.build_url(endpoint, &params);

        debug!("GET (public) {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Make a signed GET request.
    pub async fn get_signed<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> FeedResult<T> {
        let signed = self.sign_params(params);
        let url = self.build_url(endpoint, &signed);

        debug!("GET (signed) {}", endpoint);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Make a signed POST request with form-encoded parameters.
    pub async fn post_signed<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> FeedResult<T> {
        let signed = self.sign_params(params);
        let body = build_query_string(&signed);

        debug!("POST (signed) {}", endpoint);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .headers(self.auth_headers())
            .body(body)
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> FeedResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Request(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<BinanceErrorResponse>(&body) {
                return Err(map_error_code(error.code, &error.msg));
            }
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| FeedError::Parse(format!("Failed to parse response: {} - body: {}", e, body)))
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Map Binance error codes to the feed taxonomy.
fn map_error_code(code: i32, message: &str) -> FeedError {
    match code {
        -2014 | -2015 => FeedError::Authorization(message.to_string()),
        -1022 => FeedError::Authorization(message.to_string()),
        _ => FeedError::VenueSpecific {
            code,
            message: message.to_string(),
        },
    }
}

/// Binance-style error response body.
#[derive(Debug, serde::Deserialize)]
struct BinanceErrorResponse {
    code: i32,
    msg: String,
}
