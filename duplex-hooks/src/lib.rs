//! # duplex-hooks
//!
//! Canonical pre-dispatch hooks for `duplex-core` endpoints:
//!
//! - [`AuthHook`]: bearer-token authentication against a key set or a
//!   custom validator
//! - [`RateLimitHook`]: sliding-window rate limiting keyed by method (or a
//!   custom key generator)
//!
//! Hooks run in registration order before method dispatch on inbound
//! requests; the first refusal becomes the error response.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use duplex_core::endpoint::McpServer;
//! use duplex_hooks::{AuthConfig, AuthHook, RateLimitConfig, RateLimitHook};
//!
//! let server = McpServer::builder("guarded", "1.0.0")
//!     .hook(Arc::new(AuthHook::new(
//!         AuthConfig::new().api_key("secret-key"),
//!     )))
//!     .hook(Arc::new(RateLimitHook::new(RateLimitConfig::MODERATE)))
//!     .build();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod auth;
mod rate_limit;

pub use auth::{AuthConfig, AuthHook};
pub use rate_limit::{KeyGenerator, RateLimitConfig, RateLimitHook, RateLimitStats};
