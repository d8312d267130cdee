//! Bounded fan-out for per-artifact stages.

use rayon::prelude::*;
use tracing::warn;

/// Apply `f` to every item using at most `jobs` threads, keeping input order.
///
/// `jobs <= 1` runs sequentially on the calling thread.
pub fn map_bounded<T, U, F>(items: &[T], jobs: usize, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    if jobs <= 1 || items.len() <= 1 {
        return items.iter().map(f).collect();
    }
    let threads = jobs.min(items.len());
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("apkpipe-worker-{i}"))
        .build()
    {
        Ok(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        Err(e) => {
            warn!(err = %e, threads, "thread pool unavailable, running sequentially");
            items.iter().map(f).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn keeps_input_order() {
        let items: Vec<u64> = (0..16).collect();
        let out = map_bounded(&items, 4, |n| {
            thread::sleep(Duration::from_millis(16 - n));
            n * 10
        });
        assert_eq!(out, (0..16).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_job_limit() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<usize> = (0..12).collect();
        map_bounded(&items, 3, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
