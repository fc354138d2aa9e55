//! Calculator service: the single-call adapter template.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::CalculatorConfig;

/// Arithmetic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calculator failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalculatorError {
    #[error("{0}")]
    DivisionByZero(String),

    #[error("Operation '{0}' is not enabled")]
    OperationDisabled(Operation),

    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),
}

/// Performs arithmetic for the `calculate` tool
#[derive(Debug, Clone)]
pub struct CalculatorService {
    config: CalculatorConfig,
}

impl CalculatorService {
    pub fn new(config: CalculatorConfig) -> Self {
        tracing::debug!(
            "Calculator enabled operations: {:?}",
            config.enabled_operations
        );
        Self { config }
    }

    /// Operations accepted by this instance, in declaration order
    pub fn enabled_operations(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| self.config.enabled_operations.contains(op))
            .collect()
    }

    pub fn calculate(&self, op: Operation, a: f64, b: f64) -> Result<f64, CalculatorError> {
        if !self.config.enabled_operations.contains(&op) {
            return Err(CalculatorError::OperationDisabled(op));
        }

        match op {
            Operation::Add => Ok(a + b),
            Operation::Subtract => Ok(a - b),
            Operation::Multiply => Ok(a * b),
            Operation::Divide => {
                if b == 0.0 {
                    let message = if self.config.verbose_errors {
                        format!("Cannot divide {} by zero", a)
                    } else {
                        "Cannot divide by zero".to_string()
                    };
                    Err(CalculatorError::DivisionByZero(message))
                } else {
                    Ok(a / b)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(ops: &[Operation], verbose: bool) -> CalculatorService {
        CalculatorService::new(CalculatorConfig {
            enabled_operations: ops.to_vec(),
            verbose_errors: verbose,
        })
    }

    #[test]
    fn test_basic_operations() {
        let calc = service(&Operation::ALL, false);
        assert_eq!(calc.calculate(Operation::Add, 2.0, 3.0).unwrap(), 5.0);
        assert_eq!(calc.calculate(Operation::Subtract, 2.0, 3.0).unwrap(), -1.0);
        assert_eq!(calc.calculate(Operation::Multiply, 2.0, 3.0).unwrap(), 6.0);
        assert_eq!(calc.calculate(Operation::Divide, 3.0, 2.0).unwrap(), 1.5);
    }

    #[test]
    fn test_division_by_zero() {
        let calc = service(&Operation::ALL, false);
        assert_eq!(
            calc.calculate(Operation::Divide, 1.0, 0.0).unwrap_err().to_string(),
            "Cannot divide by zero"
        );

        let verbose = service(&Operation::ALL, true);
        assert_eq!(
            verbose
                .calculate(Operation::Divide, 4.0, 0.0)
                .unwrap_err()
                .to_string(),
            "Cannot divide 4 by zero"
        );
    }

    #[test]
    fn test_disabled_operation() {
        let calc = service(&[Operation::Add], false);
        assert_eq!(
            calc.calculate(Operation::Multiply, 1.0, 2.0),
            Err(CalculatorError::OperationDisabled(Operation::Multiply))
        );
        assert_eq!(calc.enabled_operations(), vec![Operation::Add]);
    }

    #[test]
    fn test_parse_operation() {
        assert_eq!(Operation::parse("divide"), Some(Operation::Divide));
        assert_eq!(Operation::parse("modulo"), None);
    }
}
