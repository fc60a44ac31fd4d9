//! Shared suspension/cancellation primitives for the metaheuristics (C5) and
//! exact solver (C6), per spec §5: "Cancellation and timeout unify: both are
//! a deadline-or-token passed through the call stack."

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cooperative cancellation flag. Cloning shares the same underlying
/// signal; checked at suspension points only (generation boundaries in C5,
/// node expansion in C6, between profile partitions in C7).
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A wall-clock budget plus a cancellation token, checked together at every
/// suspension point. A facade-initiated timeout is modelled as cancellation
/// requested by the facade (spec §5): callers that want "timeout equals
/// cancellation" semantics should call [`CancellationToken::cancel`] from a
/// timer rather than relying solely on `deadline`.
#[derive(Clone, Debug)]
pub struct SolveContext {
    /// Random seed for this call, derived from the request id if not
    /// explicit (spec §5: "all randomness is seeded for reproducibility").
    pub seed: u64,
    /// Instant after which the search must stop and return its best-so-far.
    pub deadline: Option<Instant>,
    /// Cooperative cancellation flag.
    pub cancellation: CancellationToken,
    /// Worker count available to a parallel search (spec §5:
    /// `min(hw_parallelism, performance.workers)`).
    pub workers: usize,
}

impl SolveContext {
    /// Build a context with a budget in milliseconds from now.
    pub fn with_budget_ms(seed: u64, budget_ms: u64, workers: usize) -> Self {
        SolveContext {
            seed,
            deadline: Some(Instant::now() + Duration::from_millis(budget_ms)),
            cancellation: CancellationToken::new(),
            workers,
        }
    }

    /// Whether the search should stop now: either the deadline has passed
    /// or cancellation was requested.
    pub fn should_stop(&self) -> bool {
        self.cancellation.is_cancelled() || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Whether stopping was due to cancellation specifically (as opposed to
    /// a budget deadline), used to choose between `Cancelled` and
    /// `partial=true` semantics.
    pub fn was_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_observed() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn deadline_in_the_past_should_stop_immediately() {
        let ctx = SolveContext {
            seed: 1,
            deadline: Some(Instant::now() - Duration::from_millis(1)),
            cancellation: CancellationToken::new(),
            workers: 1,
        };
        assert!(ctx.should_stop());
        assert!(!ctx.was_cancelled());
    }
}
