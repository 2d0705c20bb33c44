//! HTTP middleware and request extractors.
//!
//! # Middleware Order
//! Layers added through `ServiceBuilder` run top to bottom on the request:
//! 1. `RequestIdLayer` - extract or generate the request ID first
//! 2. `TraceLayer` - request span carrying `request_id` and `user_id`
//! 3. `MetricsLayer` - count and time every response, including rejections
//! 4. `TimeoutLayer` - 408 on hung requests
//! 5. `CorsLayer` - answer preflight before auth
//! 6. `AuthLayer` - bearer token validation (skips public routes)
//!
//! [`ImageUpload`] and [`ClientIp`] are extractors rather than layers and run
//! per handler.

pub mod auth;
pub mod client_ip;
pub mod metrics;
pub mod request_id;
pub mod upload;

pub use auth::AuthLayer;
pub use client_ip::ClientIp;
pub use metrics::MetricsLayer;
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdLayer};
pub use upload::{ImageUpload, UploadPolicy};
