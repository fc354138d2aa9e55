//! Handlers for the built-in tools.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{MAX_RESULTS_RANGE, MIN_TEXT_LENGTH};
use crate::mcp::error::ToolError;
use crate::mcp::schema::{FieldSpec, ToolSchema, ValidatedArgs};
use crate::mcp::tools::{Tool, ToolHandler};
use crate::models::{ArxivSearchResult, ToolDefinition};
use crate::services::{ArxivService, CalculatorService, Operation, ServiceContext, ServiceKind};

/// Text returned when a search yields nothing
pub const NO_RESULTS_TEXT: &str =
    "No relevant papers found or processed on arXiv for the given query";

/// Tools for the given constructed services
pub fn builtin_tools(services: &[ServiceKind]) -> Vec<Tool> {
    let mut tools = Vec::new();
    if services.contains(&ServiceKind::ARXIV) {
        tools.push(Tool::new(arxiv_search_definition(), Arc::new(ArxivSearchHandler)));
    }
    if services.contains(&ServiceKind::CALCULATOR) {
        tools.push(Tool::new(calculate_definition(), Arc::new(CalculateHandler)));
    }
    tools
}

fn arxiv_search_definition() -> ToolDefinition {
    let schema = ToolSchema::new()
        .field(
            FieldSpec::string("query")
                .required()
                .length(Some(1), None)
                .description("Search query for arXiv (e.g. 'quantum computing', 'au:Hinton')"),
        )
        .field(
            FieldSpec::integer("max_results")
                .ge(*MAX_RESULTS_RANGE.start() as f64)
                .le(*MAX_RESULTS_RANGE.end() as f64)
                .description("Number of papers to return (defaults to the server setting)"),
        )
        .field(
            FieldSpec::integer("max_text_length")
                .ge(MIN_TEXT_LENGTH as f64)
                .description("Maximum characters of full text per paper"),
        );

    ToolDefinition::new(
        "arxiv_search",
        "Search arXiv for papers, download their PDFs and return metadata with extracted full text.",
        schema,
    )
}

fn calculate_definition() -> ToolDefinition {
    let schema = ToolSchema::new()
        .field(
            FieldSpec::string("operation")
                .required()
                .one_of(Operation::ALL.iter().map(|op| op.as_str()))
                .description("Arithmetic operation to perform"),
        )
        .field(
            FieldSpec::number("operand1")
                .required()
                .description("First operand"),
        )
        .field(
            FieldSpec::number("operand2")
                .required()
                .description("Second operand"),
        );

    ToolDefinition::new(
        "calculate",
        "Performs basic arithmetic operations (add, subtract, multiply, divide).",
        schema,
    )
}

/// Handler for `arxiv_search`
#[derive(Debug)]
pub struct ArxivSearchHandler;

#[async_trait]
impl ToolHandler for ArxivSearchHandler {
    async fn execute(&self, args: ValidatedArgs, ctx: &ServiceContext) -> Result<String, ToolError> {
        let service = ctx.service::<ArxivService>(ServiceKind::ARXIV)?;

        let query = args.str("query")?;
        let max_results = args.opt_i64("max_results").map(|n| n as usize);
        let max_text_length = args.opt_i64("max_text_length").map(|n| n as usize);

        let results = service.search(query, max_results, max_text_length).await?;
        Ok(format_results(&results))
    }
}

/// Render search results as the tool's text block
pub fn format_results(results: &[ArxivSearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS_TEXT.to_string();
    }

    let mut out = String::from("ArXiv Search Results:");
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("\n---\n\nPaper {}:\n{}", i + 1, result));
    }
    out
}

/// Handler for `calculate`
#[derive(Debug)]
pub struct CalculateHandler;

#[async_trait]
impl ToolHandler for CalculateHandler {
    async fn execute(&self, args: ValidatedArgs, ctx: &ServiceContext) -> Result<String, ToolError> {
        let calculator = ctx.service::<CalculatorService>(ServiceKind::CALCULATOR)?;

        let name = args.str("operation")?;
        let operation = Operation::parse(name)
            .ok_or_else(|| crate::services::CalculatorError::UnknownOperation(name.to_string()))?;
        let a = args.f64("operand1")?;
        let b = args.f64("operand2")?;

        let value = calculator.calculate(operation, a, b)?;
        tracing::debug!("{} {} {} = {}", a, operation, b, value);
        Ok(format!("Calculation result: {}", value))
    }
}
