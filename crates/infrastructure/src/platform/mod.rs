//! Deployment platform HTTP adapter.

mod http;

pub use http::{DokployPlatformClient, PlatformClientConfig, RetryPolicy};
