//! Backend services and their lifecycle.
//!
//! - [`ServiceRegistry`]: construct-once cache keyed by [`ServiceKind`]
//! - [`LifecycleManager`]: builds services at startup, tears them down at shutdown
//! - [`arxiv`]: arXiv search with concurrent PDF processing
//! - [`calculator`]: arithmetic backend
//! - [`mock`]: in-memory arXiv backend for tests

pub mod arxiv;
pub mod calculator;
mod lifecycle;
pub mod mock;
mod registry;

pub use arxiv::{ArxivBackend, ArxivError, ArxivService, HttpArxivBackend};
pub use calculator::{CalculatorError, CalculatorService, Operation};
pub use lifecycle::{LifecycleError, LifecycleManager, ServiceContext};
pub use registry::{ServiceError, ServiceKind, ServiceRegistry};
