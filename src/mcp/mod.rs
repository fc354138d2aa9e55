//! MCP (Model Context Protocol) tool layer.
//!
//! - [`schema`]: argument declarations and validation
//! - [`tools`]: the tool table and the call dispatcher
//! - [`handlers`]: the built-in `arxiv_search` and `calculate` tools
//! - [`server`]: pmcp transport (stdio, HTTP/SSE)

mod error;
pub mod handlers;
pub mod schema;
pub mod server;
mod tools;

pub use error::ToolError;
pub use schema::{FieldSpec, FieldType, ToolSchema, ValidatedArgs, ValidationError};
pub use server::McpServer;
pub use tools::{
    DispatchStats, DispatcherError, StatsSnapshot, Tool, ToolDispatcher, ToolHandler,
};
