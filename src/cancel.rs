use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Shared registry of in-flight request cancellation tokens.
///
/// Each attempt registers its own token on entry and removes it on exit via a
/// drop guard, so the registry never outlives the attempt on any exit path.
/// [`RequestScope::cancel_all`] aborts every outstanding request at once,
/// which is how a consuming context tears down its pending traffic.
#[derive(Clone, Debug, Default)]
pub struct RequestScope {
    inner: Arc<ScopeInner>,
}

#[derive(Debug, Default)]
struct ScopeInner {
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, CancellationToken>>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts currently registered.
    pub fn active(&self) -> usize {
        self.inner.active_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active() == 0
    }

    /// Cancels every registered token and clears the registry.
    pub fn cancel_all(&self) {
        let drained: Vec<CancellationToken> = {
            let mut active = self.inner.active_map();
            active.drain().map(|(_, token)| token).collect()
        };
        tracing::debug!(count = drained.len(), "cancelling all in-flight requests");
        for token in drained {
            token.cancel();
        }
    }

    pub(crate) fn register(&self, token: CancellationToken) -> ScopeGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.active_map().insert(id, token);
        ScopeGuard {
            inner: Arc::clone(&self.inner),
            id,
        }
    }
}

impl ScopeInner {
    fn active_map(&self) -> std::sync::MutexGuard<'_, HashMap<u64, CancellationToken>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes the attempt's token from the registry when the attempt ends,
/// whether it succeeded, failed, or was cancelled.
pub(crate) struct ScopeGuard {
    inner: Arc<ScopeInner>,
    id: u64,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.inner.active_map().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::RequestScope;

    #[test]
    fn guard_removes_entry_on_drop() {
        let scope = RequestScope::new();
        let guard = scope.register(CancellationToken::new());
        assert_eq!(scope.active(), 1);
        drop(guard);
        assert!(scope.is_empty());
    }

    #[test]
    fn cancel_all_cancels_every_token_and_clears() {
        let scope = RequestScope::new();
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        let _a = scope.register(first.clone());
        let _b = scope.register(second.clone());

        scope.cancel_all();

        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(scope.is_empty());
    }

    #[test]
    fn clones_share_one_registry() {
        let scope = RequestScope::new();
        let other = scope.clone();
        let _guard = scope.register(CancellationToken::new());
        assert_eq!(other.active(), 1);
    }
}
