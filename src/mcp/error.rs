//! Errors a tool handler may return.

use crate::mcp::schema::ValidationError;
use crate::services::arxiv::ArxivError;
use crate::services::calculator::CalculatorError;
use crate::services::ServiceError;

/// Call-scoped failure of a tool handler.
///
/// The dispatcher turns every variant into a text result; none of them reach
/// the transport as a protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The caller sent arguments the backend refused
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A backend service failed
    #[error("{service} error: {message}")]
    Upstream { service: String, message: String },

    /// A bug or environment failure; details are logged, not returned
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }
}

impl From<ArxivError> for ToolError {
    fn from(err: ArxivError) -> Self {
        match err {
            ArxivError::EmptyQuery => {
                ToolError::Validation(ValidationError::new("query", err.to_string()))
            }
            ArxivError::ScratchDir(e) => {
                ToolError::Internal(format!("arXiv scratch directory: {}", e))
            }
            ArxivError::Io(e) => ToolError::Internal(format!("arXiv I/O: {}", e)),
            other => ToolError::upstream("arXiv", other.to_string()),
        }
    }
}

impl From<CalculatorError> for ToolError {
    fn from(err: CalculatorError) -> Self {
        match err {
            CalculatorError::UnknownOperation(_) => {
                ToolError::Validation(ValidationError::new("operation", err.to_string()))
            }
            other => ToolError::upstream("Calculator", other.to_string()),
        }
    }
}

impl From<ServiceError> for ToolError {
    fn from(err: ServiceError) -> Self {
        ToolError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::calculator::Operation;

    #[test]
    fn test_arxiv_error_mapping() {
        assert!(matches!(
            ToolError::from(ArxivError::EmptyQuery),
            ToolError::Validation(_)
        ));

        let err = ToolError::from(ArxivError::Backend("rate limited".to_string()));
        assert_eq!(err.to_string(), "arXiv error: rate limited");
    }

    #[test]
    fn test_calculator_error_mapping() {
        let err = ToolError::from(CalculatorError::DivisionByZero(
            "Cannot divide by zero".to_string(),
        ));
        assert_eq!(err.to_string(), "Calculator error: Cannot divide by zero");

        let err = ToolError::from(CalculatorError::OperationDisabled(Operation::Divide));
        assert!(matches!(err, ToolError::Upstream { .. }));
    }
}
