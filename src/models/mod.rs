//! Core data models for tool calls and arXiv results.

mod arxiv;
mod tool;

pub use arxiv::{ArxivPaper, ArxivPaperBuilder, ArxivSearchResult};
pub use tool::{
    ResultKind, TextContent, ToolCallRequest, ToolCallResult, ToolDefinition,
};
