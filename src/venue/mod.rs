//! Venue plumbing: endpoints, signing, HTTP and WebSocket transports,
//! wire types, and the API trait the rest of the crate consumes.

pub mod api;
pub mod endpoints;
pub mod http;
pub mod signer;
pub mod types;
pub mod ws;

pub use api::{BinanceClient, MarketApi};
pub use endpoints::Endpoints;
pub use http::HttpClient;
pub use signer::{BinanceHmacSigner, RequestSigner};
pub use ws::{StreamCallback, StreamSignal};
