//! "Still mounted" guard for asynchronous continuations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag flipped once when the owning workflow is torn down
///
/// Background tasks hold a clone and check [`Lifecycle::is_mounted`] before
/// publishing any result, so nothing observable happens after teardown.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    mounted: Arc<AtomicBool>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Returns `true` only for the call that performed the unmount
    pub fn unmount(&self) -> bool {
        self.mounted.swap(false, Ordering::AcqRel)
    }

    /// Run `f` only while still mounted
    pub fn guard<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        self.is_mounted().then(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmount_is_shared_and_once() {
        let lifecycle = Lifecycle::new();
        let task_view = lifecycle.clone();

        assert!(task_view.is_mounted());
        assert!(lifecycle.unmount());
        assert!(!lifecycle.unmount());
        assert!(!task_view.is_mounted());
        assert_eq!(task_view.guard(|| 1), None);
    }
}
