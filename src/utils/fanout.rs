//! Bounded, order-preserving fan-out over independent work items.
//!
//! Every item runs as its own tokio task. Whatever an item does (return an
//! error, hang past its timeout, panic), the outcome lands in that item's slot
//! and never touches its siblings. Outcomes come back in input order regardless
//! of completion order.
//!
//! # Modes
//!
//! - [`FanOut::run`] processes every item and returns one slot per item.
//! - [`FanOut::collect_until`] processes items in input order until `target`
//!   of them succeed, starting no more work than could still be needed. This
//!   is the over-fetch mode: hand it a larger candidate pool than you need and
//!   it stops as soon as enough candidates have been *processed* successfully.
//!
//! ```rust,no_run
//! use mcp_adapters::utils::{FanOut, FanOutOptions};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let fanout = FanOut::new(FanOutOptions::default().item_timeout(Duration::from_secs(5)));
//! let outcomes = fanout
//!     .run(vec![1u64, 2, 3], |n| async move { Ok::<_, String>(n * 2) })
//!     .await;
//! assert_eq!(outcomes.len(), 3);
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{Id, JoinError, JoinSet};

/// Tuning knobs for a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutOptions {
    /// Maximum number of items in flight at once (`None` = no bound)
    pub concurrency_limit: Option<usize>,

    /// Per-item deadline; an item still running after it becomes a `TimedOut` slot
    pub item_timeout: Option<Duration>,
}

impl FanOutOptions {
    /// Bound the number of items in flight
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit.max(1));
        self
    }

    /// Set the per-item deadline
    pub fn item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }
}

/// Why a single item did not produce a value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ItemError<E> {
    /// The operation returned an error
    #[error("{0}")]
    Failed(E),

    /// The operation did not finish within the per-item timeout
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The operation panicked
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// The slot for one processed item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome<R, E> {
    /// Position of the item in the input sequence
    pub index: usize,

    /// What the item produced
    pub result: Result<R, ItemError<E>>,
}

impl<R, E> ItemOutcome<R, E> {
    /// Whether this item produced a value
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs per-item async operations concurrently and reassembles their outcomes
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOut {
    options: FanOutOptions,
}

impl FanOut {
    /// Create a fan-out with the given options
    pub fn new(options: FanOutOptions) -> Self {
        Self { options }
    }

    /// Process every item; the output has one slot per input item, in input order.
    pub async fn run<T, R, E, F, Fut>(&self, items: Vec<T>, op: F) -> Vec<ItemOutcome<R, E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let target = items.len();
        self.drive(items, target, op).await
    }

    /// Process items in input order until `target` of them succeed.
    ///
    /// Returns exactly `target` successful slots when enough candidates
    /// succeed. When the pool runs dry first, returns every success plus the
    /// earliest failures, up to `target` slots. Slots are in input order.
    pub async fn collect_until<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        target: usize,
        op: F,
    ) -> Vec<ItemOutcome<R, E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.drive(items, target, op).await
    }

    async fn drive<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        target: usize,
        op: F,
    ) -> Vec<ItemOutcome<R, E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        if target == 0 || items.is_empty() {
            return Vec::new();
        }

        let window = self.options.concurrency_limit.unwrap_or(usize::MAX).max(1);
        let item_timeout = self.options.item_timeout;
        let op = Arc::new(op);

        let mut pending = items.into_iter().enumerate();
        let mut tasks: JoinSet<(usize, Result<R, ItemError<E>>)> = JoinSet::new();
        let mut task_index: HashMap<Id, usize> = HashMap::new();
        let mut completed: BTreeMap<usize, Result<R, ItemError<E>>> = BTreeMap::new();
        let mut successes = 0usize;

        loop {
            // Only start work that could still be needed to reach the target.
            while tasks.len() < window && successes + tasks.len() < target {
                let Some((index, item)) = pending.next() else {
                    break;
                };
                let op = Arc::clone(&op);
                let handle = tasks.spawn(async move {
                    let work = op(item);
                    let result = match item_timeout {
                        Some(limit) => match tokio::time::timeout(limit, work).await {
                            Ok(result) => result.map_err(ItemError::Failed),
                            Err(_) => Err(ItemError::TimedOut(limit)),
                        },
                        None => work.await.map_err(ItemError::Failed),
                    };
                    (index, result)
                });
                task_index.insert(handle.id(), index);
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            let (index, result) = match joined {
                Ok(slot) => slot,
                Err(err) => match task_index.get(&err.id()) {
                    Some(&index) => (index, Err(ItemError::Panicked(panic_message(&err)))),
                    None => {
                        tracing::error!("Fan-out lost track of a task: {}", err);
                        continue;
                    }
                },
            };

            if result.is_ok() {
                successes += 1;
            }
            tracing::trace!(index, ok = result.is_ok(), "fan-out item finished");
            completed.insert(index, result);

            if successes >= target {
                break;
            }
        }

        assemble(completed, successes, target)
    }
}

/// Pick the slots to return: all successes, topped up with the earliest
/// failures, capped at `target`, in input order.
fn assemble<R, E>(
    completed: BTreeMap<usize, Result<R, ItemError<E>>>,
    successes: usize,
    target: usize,
) -> Vec<ItemOutcome<R, E>> {
    let mut failure_budget = target.saturating_sub(successes);
    let mut out = Vec::with_capacity(target.min(completed.len()));

    for (index, result) in completed {
        if result.is_err() {
            if failure_budget == 0 {
                continue;
            }
            failure_budget -= 1;
        }
        out.push(ItemOutcome { index, result });
        if out.len() == target {
            break;
        }
    }

    out
}

fn panic_message(err: &JoinError) -> String {
    if err.is_cancelled() {
        return "task was cancelled".to_string();
    }
    // JoinError's Display already carries the panic payload when it is a string.
    err.to_string()
}

impl<E: fmt::Display> ItemError<E> {
    /// Short human-readable reason, suitable for a per-item error field
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_run_preserves_order_under_reverse_completion() {
        let fanout = FanOut::default();
        let items: Vec<u64> = (0..6).collect();

        let outcomes = fanout
            .run(items, |n| async move {
                // Later items finish first.
                tokio::time::sleep(Duration::from_millis((6 - n) * 15)).await;
                Ok::<_, String>(n * 10)
            })
            .await;

        assert_eq!(outcomes.len(), 6);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.index, i);
            assert_eq!(outcome.result, Ok(i as u64 * 10));
        }
    }

    #[tokio::test]
    async fn test_run_isolates_errors_and_panics() {
        let fanout = FanOut::default();

        let outcomes = fanout
            .run(vec![0, 1, 2, 3], |n| async move {
                match n {
                    1 => Err("boom".to_string()),
                    2 => panic!("item two exploded"),
                    _ => Ok(n),
                }
            })
            .await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].result, Ok(0));
        assert_eq!(outcomes[1].result, Err(ItemError::Failed("boom".to_string())));
        assert!(matches!(outcomes[2].result, Err(ItemError::Panicked(_))));
        assert_eq!(outcomes[3].result, Ok(3));
    }

    #[tokio::test]
    async fn test_item_timeout_becomes_failed_slot() {
        let fanout = FanOut::new(FanOutOptions::default().item_timeout(Duration::from_millis(20)));

        let outcomes = fanout
            .run(vec![0u64, 1], |n| async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok::<_, String>(n)
            })
            .await;

        assert_eq!(
            outcomes[0].result,
            Err(ItemError::TimedOut(Duration::from_millis(20)))
        );
        assert_eq!(outcomes[1].result, Ok(1));
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let fanout = FanOut::new(FanOutOptions::default().concurrency_limit(2));

        let (flight, high) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let outcomes = fanout
            .run((0..8).collect::<Vec<u32>>(), move |n| {
                let flight = Arc::clone(&flight);
                let high = Arc::clone(&high);
                async move {
                    let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                    high.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(n)
                }
            })
            .await;

        assert_eq!(outcomes.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_collect_until_stops_at_target() {
        let started = Arc::new(AtomicUsize::new(0));
        let fanout = FanOut::default();

        let counter = Arc::clone(&started);
        let outcomes = fanout
            .collect_until((0..10).collect::<Vec<usize>>(), 3, move |n| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, String>(n) }
            })
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(ItemOutcome::is_success));
        // Nothing beyond what could reach the target was started.
        assert_eq!(started.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_collect_until_replaces_failures_from_pool() {
        let fanout = FanOut::default();

        let outcomes = fanout
            .collect_until(vec![0, 1, 2, 3, 4], 2, |n| async move {
                if n == 0 {
                    Err("first candidate broken".to_string())
                } else {
                    Ok(n)
                }
            })
            .await;

        let indices: Vec<usize> = outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(outcomes.iter().all(ItemOutcome::is_success));
    }

    #[tokio::test]
    async fn test_collect_until_exhausted_pool_keeps_earliest_failures() {
        let fanout = FanOut::default();

        let outcomes = fanout
            .collect_until(vec![0, 1, 2, 3, 4], 2, |n| async move {
                if n == 3 {
                    Ok(n)
                } else {
                    Err(format!("candidate {} failed", n))
                }
            })
            .await;

        // One success (index 3) plus the earliest failure (index 0).
        let indices: Vec<usize> = outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 3]);
        assert!(!outcomes[0].is_success());
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn test_empty_input_and_zero_target() {
        let fanout = FanOut::default();
        let none = fanout
            .run(Vec::<u8>::new(), |n| async move { Ok::<_, String>(n) })
            .await;
        assert!(none.is_empty());

        let zero = fanout
            .collect_until(vec![1u8, 2], 0, |n| async move { Ok::<_, String>(n) })
            .await;
        assert!(zero.is_empty());
    }

    #[test]
    fn test_item_error_reason() {
        let err: ItemError<String> = ItemError::Failed("download refused".to_string());
        assert_eq!(err.reason(), "download refused");
        let err: ItemError<String> = ItemError::TimedOut(Duration::from_secs(2));
        assert_eq!(err.reason(), "timed out after 2s");
    }
}
