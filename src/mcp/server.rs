//! MCP server implementation using pmcp (Pragmatic AI's rust-mcp-sdk).
//!
//! Every tool in the dispatcher is exposed through pmcp over stdio or
//! streamable HTTP/SSE. Tool calls always answer with a content result; a
//! failed call sets `isError` instead of raising a JSON-RPC error.

use crate::mcp::tools::ToolDispatcher;
use async_trait::async_trait;
use pmcp::{
    server::streamable_http_server::StreamableHttpServer, Error, RequestHandlerExtra, Server,
    ServerCapabilities, ToolHandler, ToolInfo,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// The MCP server in front of a [`ToolDispatcher`]
#[derive(Debug, Clone)]
pub struct McpServer {
    server: Arc<Mutex<Server>>,
}

impl McpServer {
    /// Create a new MCP server exposing every tool of `dispatcher`
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Result<Self, pmcp::Error> {
        let server = Self::build_server_impl(dispatcher)?;
        Ok(Self {
            server: Arc::new(Mutex::new(server)),
        })
    }

    fn build_server_impl(dispatcher: Arc<ToolDispatcher>) -> Result<Server, pmcp::Error> {
        let mut builder = Server::builder()
            .name(env!("CARGO_PKG_NAME"))
            .version(env!("CARGO_PKG_VERSION"))
            .capabilities(ServerCapabilities::default());

        for definition in dispatcher.definitions() {
            let wrapper = ToolWrapper {
                name: definition.name.clone(),
                description: Some(definition.description.clone()),
                input_schema: definition.schema.to_json_schema(),
                dispatcher: Arc::clone(&dispatcher),
            };
            builder = builder.tool(wrapper.name.clone(), wrapper);
        }

        builder.build()
    }

    /// Run the server in stdio mode
    pub async fn run(self) -> Result<(), pmcp::Error> {
        tracing::info!("Starting MCP server in stdio mode");

        // run_stdio() takes ownership of the Server
        let server = Arc::try_unwrap(self.server)
            .map_err(|_| Error::internal("MCP server is shared; cannot run stdio transport"))?
            .into_inner();

        server.run_stdio().await
    }

    /// Run the server in streamable HTTP/SSE mode
    pub async fn run_http(&self, addr: &str) -> Result<(SocketAddr, JoinHandle<()>), pmcp::Error> {
        tracing::info!("Starting MCP server in HTTP/SSE mode on {}", addr);

        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::invalid_params(format!("Invalid address: {}", e)))?;

        let http_server = StreamableHttpServer::new(socket_addr, self.server.clone());
        http_server.start().await
    }
}

/// Adapts one dispatcher tool to pmcp's ToolHandler
#[derive(Clone)]
struct ToolWrapper {
    name: String,
    description: Option<String>,
    input_schema: Value,
    dispatcher: Arc<ToolDispatcher>,
}

#[async_trait]
impl ToolHandler for ToolWrapper {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> Result<Value, Error> {
        let result = self.dispatcher.dispatch(&self.name, args).await;
        Ok(result.to_wire())
    }

    fn metadata(&self) -> Option<ToolInfo> {
        Some(ToolInfo::new(
            self.name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        ))
    }
}
