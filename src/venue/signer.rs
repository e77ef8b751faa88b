//! HMAC-SHA256 request signing for the Binance API.
//!
//! Binance authenticates signed endpoints by appending a `timestamp`
//! parameter, computing HMAC-SHA256 over the query string, and appending
//! the hex signature. The API key travels in the `x-mbx-apikey` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs request parameters for a venue.
pub trait RequestSigner: Send + Sync {
    /// Sign the parameters in place, adding timestamp and signature.
    fn sign(&self, params: &mut Vec<(String, String)>, timestamp: u64);

    /// Header name carrying the API key.
    fn api_key_header(&self) -> &str;

    /// The API key value.
    fn api_key(&self) -> &str;
}

/// Build a query string from parameters, in order.
pub fn build_query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 signer for the Binance API.
#[derive(Clone)]
pub struct BinanceHmacSigner {
    api_key: String,
    api_secret: String,
}

impl BinanceHmacSigner {
    /// Create a new signer.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Create a signer from environment variables, if both are set.
    pub fn from_env(api_key_env: &str, api_secret_env: &str) -> Option<Self> {
        let api_key = std::env::var(api_key_env).ok()?;
        let api_secret = std::env::var(api_secret_env).ok()?;
        Some(Self::new(api_key, api_secret))
    }

    fn compute_signature(&self, data: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.api_secret.as_bytes()).expect("HMAC can take any size");
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl RequestSigner for BinanceHmacSigner {
    fn sign(&self, params: &mut Vec<(String, String)>, timestamp: u64) {
        params.push(("timestamp".to_string(), timestamp.to_string()));
        let query = build_query_string(params);
        let signature = self.compute_signature(&query);
        params.push(("signature".to_string(), signature));
    }

    fn api_key_header(&self) -> &str {
        "x-mbx-apikey"
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }
}
