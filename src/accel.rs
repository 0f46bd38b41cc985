//! Accelerated execution support.
//!
//! The projection engine exposes two functionally identical inner loops: a
//! sequential reference path and a rayon-parallel path running on a shared
//! thread pool. The pool is built lazily on first use and cached for the
//! lifetime of the process; it holds no per-call state. If the pool cannot
//! be built, the engine silently falls back to the reference path.

use std::sync::OnceLock;

static POOL: OnceLock<Option<rayon::ThreadPool>> = OnceLock::new();

/// The process-wide thread pool, or `None` if it could not be built.
///
/// `OnceLock` synchronizes concurrent first use, so the pool is built
/// exactly once and is read-only afterwards.
pub fn shared_pool() -> Option<&'static rayon::ThreadPool> {
    POOL.get_or_init(|| rayon::ThreadPoolBuilder::new().build().ok()).as_ref()
}

/// Whether the accelerated execution path can run in this process.
pub fn accelerator_available() -> bool {
    shared_pool().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_is_reused() {
        let first = shared_pool().map(|p| p as *const rayon::ThreadPool);
        let second = shared_pool().map(|p| p as *const rayon::ThreadPool);
        assert_eq!(first, second);
    }

    #[test]
    fn test_availability_is_stable() {
        assert_eq!(accelerator_available(), accelerator_available());
    }
}
