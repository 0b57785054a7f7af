//! # duplex-core
//!
//! Protocol engine for both endpoints of the Model Context Protocol (MCP):
//! a bidirectional JSON-RPC 2.0 message protocol exposing tools, resources,
//! and prompts over a newline-delimited byte-stream transport.
//!
//! ## Architecture
//!
//! - [`messages`]: every type that crosses the wire
//! - [`error`]: the flat, wire-stable error taxonomy
//! - [`schema`]: embedded JSON Schema validation for tool inputs
//! - [`transport`]: line framing and the byte-stream transport
//! - [`endpoint`]: the server and client roles over a shared core:
//!   request/response correlation, timeouts, dispatch, lifecycle, registries
//! - [`hook`]: the pre-dispatch hook contract (auth, rate limiting, and
//!   friends plug in here)
//!
//! ## A server in a few lines
//!
//! ```rust,no_run
//! use duplex_core::endpoint::{tool_fn, McpServer};
//! use duplex_core::messages::Tool;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> duplex_core::McpResult<()> {
//!     let server = McpServer::builder("adder", "1.0.0").build();
//!     server
//!         .add_tool(
//!             Tool::new("add", "Adds two numbers").with_input_schema(json!({
//!                 "type": "object",
//!                 "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
//!                 "required": ["a", "b"]
//!             })),
//!             tool_fn(|args| {
//!                 let a = args["a"].as_f64().unwrap_or(0.0);
//!                 let b = args["b"].as_f64().unwrap_or(0.0);
//!                 Ok(json!(a + b))
//!             }),
//!         )
//!         .await;
//!
//!     server.start_stdio().await?.closed().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod endpoint;
pub mod error;
pub mod hook;
pub mod messages;
pub mod schema;
pub mod transport;

pub use endpoint::{
    EndpointConfig, EndpointState, McpClient, McpServer, NotificationHandler, StatsSnapshot,
};
pub use error::{McpError, McpResult};
pub use hook::{HookChain, PreDispatchHook, RequestContext};
pub use messages::{Implementation, JsonRpcMessage, RequestId, PROTOCOL_VERSION};
pub use transport::{ByteStreamTransport, TransportError, TransportEvent, TransportSender};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
