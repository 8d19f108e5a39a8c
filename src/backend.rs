//! HTTP implementations of the capability traits.
//!
//! Every client is synchronous (`reqwest::blocking`), configurable through a
//! builder with environment fallbacks, and retries transient failures.
mod client;
mod elastic;
mod ollama;
mod srl;

pub use client::{BackendError, RetryPolicy, retry_with_backoff};
pub use elastic::{ElasticClient, ElasticClientBuilder, parse_hits};
pub use ollama::{OllamaClient, OllamaClientBuilder, OllamaClientTrait};
pub use srl::{SrlClient, SrlClientBuilder, SrlFrame, SrlResponse, apply_response};
