//! Turn cancellation.
//!
//! Each running turn gets a `CancelToken`. The orchestrator keeps at most
//! one registered token in its [`CancelSlot`]; registering a new turn
//! cancels the one before it.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// A cancellation token that the streaming loop can check or await.
#[derive(Clone, Debug)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: CancellationToken::new(),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the token of the turn in flight, tagged with a generation so a
/// finishing turn never unregisters its successor.
pub struct CancelSlot {
    active: Mutex<Option<(u64, CancelToken)>>,
    next_generation: AtomicU64,
}

impl Default for CancelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSlot {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Register a fresh token, cancelling the previous one if any.
    pub fn register(&self) -> (u64, CancelToken) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new();
        let previous = self.active.lock().replace((generation, token.clone()));
        if let Some((prev_gen, prev)) = previous {
            tracing::debug!(generation = prev_gen, "cancelling previous turn");
            prev.cancel();
        }
        (generation, token)
    }

    /// Cancel the registered turn. Returns true if one was running.
    pub fn cancel(&self) -> bool {
        match self.active.lock().as_ref() {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Unregister the token of `generation` (called when its turn ends).
    pub fn finish(&self, generation: u64) {
        let mut active = self.active.lock();
        if matches!(active.as_ref(), Some((g, _)) if *g == generation) {
            *active = None;
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }
}
