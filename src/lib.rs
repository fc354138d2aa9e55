//! # mcp-adapters
//!
//! A Model Context Protocol (MCP) tool-server core with two adapters on top.
//!
//! ## Architecture
//!
//! - [`mcp`]: tool schemas, the dispatcher that turns every call into a text
//!   result, the built-in tool handlers and the pmcp transport
//! - [`services`]: the construct-once service registry, the lifecycle manager
//!   and the arXiv and calculator backends
//! - [`utils`]: bounded fan-out, HTTP client, PDF extraction, retry
//! - [`models`]: tool call and arXiv data types
//! - [`config`]: layered configuration (file + per-backend environment prefixes)

pub mod config;
pub mod mcp;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use mcp::{McpServer, ToolDispatcher};
pub use models::{ResultKind, ToolCallResult};
pub use services::{LifecycleManager, ServiceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
