//! Batch processing of independent work items across worker threads.
//!
//! Each worker owns a private queue; a dispatcher assigns every item to
//! the currently least-loaded worker using a caller-supplied size
//! estimate, then closes the queues and waits for the workers to drain.
//! The engine itself stays single-threaded per trajectory, so this is
//! the only concurrency in the crate.

use std::sync::mpsc;
use std::thread;

use log::debug;

/// Run `work` over `items` on `workers` threads, preserving input order
/// in the result.
///
/// `item_size` is the load estimate used for least-loaded dispatch, for
/// example a trajectory's point count. Results are collected per worker
/// and re-assembled into input order before returning.
pub fn run_parallel<T, R, F, S>(items: Vec<T>, workers: usize, item_size: S, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
    S: Fn(&T) -> usize,
{
    let workers = workers.max(1);
    let n = items.len();
    let work = &work;

    let mut results: Vec<(usize, R)> = thread::scope(|scope| {
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = mpsc::channel::<(usize, T)>();
            senders.push(tx);
            handles.push(scope.spawn(move || {
                let mut out = Vec::new();
                while let Ok((index, item)) = rx.recv() {
                    out.push((index, work(item)));
                }
                out
            }));
        }

        // Least-loaded dispatch by running size estimate.
        let mut loads = vec![0usize; workers];
        for (index, item) in items.into_iter().enumerate() {
            let target = loads
                .iter()
                .enumerate()
                .min_by_key(|(_, load)| **load)
                .map(|(w, _)| w)
                .unwrap_or(0);
            loads[target] += item_size(&item).max(1);
            // A worker that panicked has hung up; propagate via join below.
            let _ = senders[target].send((index, item));
        }
        // Closing the channels is the workers' shutdown signal.
        drop(senders);

        let mut collected = Vec::with_capacity(n);
        for handle in handles {
            match handle.join() {
                Ok(mut part) => collected.append(&mut part),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
        collected
    });

    debug!("processed {} items on {} workers", n, workers);
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, r)| r).collect()
}

/// Rayon-based equivalent of [`run_parallel`] for callers that prefer a
/// shared pool over dedicated per-batch threads.
#[cfg(feature = "parallel")]
pub fn run_parallel_rayon<T, R, F>(items: Vec<T>, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    use rayon::prelude::*;
    items.into_par_iter().map(work).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::PointCounter;

    #[test]
    fn test_preserves_input_order() {
        let items: Vec<u64> = (0..100).collect();
        let results = run_parallel(items, 4, |_| 1, |x| x * x);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(*r, (i as u64) * (i as u64));
        }
    }

    #[test]
    fn test_single_worker_and_empty_input() {
        let results = run_parallel(vec![1, 2, 3], 1, |x| *x as usize, |x| x + 1);
        assert_eq!(results, vec![2, 3, 4]);
        let empty: Vec<i32> = run_parallel(Vec::new(), 4, |_: &i32| 1, |x| x);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_counter_aggregation_after_join() {
        // Workers return counters; the caller folds them afterwards.
        let items: Vec<u64> = vec![10, 20, 30];
        let counters = run_parallel(
            items,
            2,
            |n| *n as usize,
            |n| PointCounter {
                n_points: n,
                ..PointCounter::default()
            },
        );
        let total = counters
            .into_iter()
            .fold(PointCounter::new(), |acc, c| acc + c);
        assert_eq!(total.n_points, 60);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_rayon_variant() {
        let results = run_parallel_rayon((0..50).collect::<Vec<u64>>(), |x| x * 2);
        assert_eq!(results.len(), 50);
        assert_eq!(results[49], 98);
    }
}
