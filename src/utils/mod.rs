//! Utility modules shared by the service adapters.
//!
//! - [`FanOut`]: ordered, failure-isolated concurrent execution with an
//!   optional concurrency cap, per-item deadline and early stop at N successes
//! - [`HttpClient`]: shared reqwest client with download helpers
//! - [`extract_text`] / [`finalize_text`]: PDF text extraction and truncation
//! - [`with_retry`]: retry transient failures with exponential backoff
//!
//! # Fan-out
//!
//! ```rust
//! use mcp_adapters::utils::{FanOut, FanOutOptions};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let fan_out = FanOut::new(FanOutOptions::default().concurrency_limit(2));
//! let outcomes = fan_out
//!     .run(vec![1u32, 2, 3], |n| async move { Ok::<_, String>(n * 10) })
//!     .await;
//! let values: Vec<u32> = outcomes
//!     .into_iter()
//!     .filter_map(|o| o.result.ok())
//!     .collect();
//! assert_eq!(values, vec![10, 20, 30]);
//! # }
//! ```

mod fanout;
mod http;
mod pdf;
mod retry;

pub use fanout::{FanOut, FanOutOptions, ItemError, ItemOutcome};
pub use http::{DownloadError, HttpClient};
pub use pdf::{extract_text, finalize_text, PdfExtractError, EMPTY_TEXT_PLACEHOLDER};
pub use retry::{is_transient_reqwest, with_retry, RetryConfig, Transient};
