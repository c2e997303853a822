//! Process-wide worker thread count.
//!
//! A single settable integer, `0` meaning "use the backend default" (all cores) and `n > 0`
//! meaning exactly `n` workers. Every parallel region in this crate (the projection engine's
//! column loop, the loss evaluator) builds a scoped [`rayon::ThreadPool`] sized from this value
//! for the duration of the call rather than mutating rayon's global pool, so that two callers
//! running concurrently with different thread counts don't race each other over process-global
//! state.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};

static THREAD_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Sets the process-wide worker count. `0` selects the backend default (all cores).
pub fn set_threads(n: usize) {
    THREAD_COUNT.store(n, Ordering::Relaxed);
}

/// Returns the currently configured worker count (`0` meaning "backend default").
pub fn get_threads() -> usize {
    THREAD_COUNT.load(Ordering::Relaxed)
}

/// Builds a scoped thread pool honoring [`get_threads`]. `0` is passed through to
/// [`ThreadPoolBuilder::num_threads`] unchanged, which rayon itself interprets as "use all
/// available cores".
pub(crate) fn scoped_pool() -> ThreadPool {
    ThreadPoolBuilder::new()
        .num_threads(get_threads())
        .build()
        .expect("thread pool construction should not fail for a non-negative thread count")
}

/// Runs `f` on a scoped pool sized from [`get_threads`].
pub(crate) fn with_pool<R: Send>(f: impl FnOnce() -> R + Send) -> R {
    scoped_pool().install(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        // Not asserting a global across the test binary's shared state beyond this one check;
        // other tests may mutate THREAD_COUNT, so just check get/set round-trip.
        set_threads(4);
        assert_eq!(get_threads(), 4);
        set_threads(0);
        assert_eq!(get_threads(), 0);
    }

    #[test]
    fn scoped_pool_runs_work() {
        set_threads(2);
        let sum: i32 = with_pool(|| (1..=10).sum());
        assert_eq!(sum, 55);
        set_threads(0);
    }
}
