//! Bounded fan-out for independent upstream lookups.

use futures::stream::{self, StreamExt};
use std::future::Future;

pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Runs at most `limit` tasks at once. Each task settles on its own; a
/// failure never cancels its siblings. Results come back in input order.
#[derive(Debug, Clone, Copy)]
pub struct BoundedConcurrencyRunner {
    limit: usize,
}

impl Default for BoundedConcurrencyRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl BoundedConcurrencyRunner {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn run<I, F, T, E>(&self, tasks: I) -> Vec<Result<T, E>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        stream::iter(tasks).buffered(self.limit).collect().await
    }

    /// Maps every input through `f` under the same bound.
    pub async fn map<A, F, Fut, T, E>(&self, inputs: Vec<A>, f: F) -> Vec<Result<T, E>>
    where
        F: FnMut(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(inputs.into_iter().map(f)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_preserves_order_and_isolates_failures() {
        let runner = BoundedConcurrencyRunner::new(2);
        let results = runner
            .map(vec![30u64, 5, 20, 1], |delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                if delay == 5 {
                    Err(format!("task {delay} failed"))
                } else {
                    Ok(delay)
                }
            })
            .await;
        assert_eq!(results.len(), 4);
        assert_eq!(results[0], Ok(30));
        assert_eq!(results[1], Err("task 5 failed".to_string()));
        assert_eq!(results[2], Ok(20));
        assert_eq!(results[3], Ok(1));
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let runner = BoundedConcurrencyRunner::new(3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let results = runner
            .map((0..12).collect::<Vec<u32>>(), |i| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ()>(i)
                }
            })
            .await;
        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(BoundedConcurrencyRunner::new(0).limit(), 1);
    }
}
