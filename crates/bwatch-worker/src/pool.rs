//! Bounded per-job worker pool.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Run `worker` over an ordered sequence with fixed parallelism.
///
/// Results map by index to inputs regardless of completion order; execution
/// order is nondeterministic. There is no mid-sequence cancellation: workers
/// that cannot produce a value return their stage's sentinel instead of
/// failing the sequence.
pub async fn run_bounded<T, R, F, Fut>(concurrency: usize, items: Vec<T>, worker: F) -> Vec<R>
where
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| worker(item, index)),
    )
    .buffered(concurrency.max(1))
    .collect()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_preserve_index() {
        let items = vec![30u64, 10, 20, 5, 1];
        let results = run_bounded(3, items.clone(), |item, index| async move {
            // later items finish earlier
            tokio::time::sleep(Duration::from_millis(item)).await;
            (index, item)
        })
        .await;

        for (i, (index, item)) in results.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(*item, items[i]);
        }
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        run_bounded(5, (0..40).collect(), |_, _| async {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<u32> = run_bounded(5, Vec::<u32>::new(), |item, _| async move { item }).await;
        assert!(results.is_empty());
    }
}
