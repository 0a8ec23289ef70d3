//! Cancellable stepped fit execution
//!
//! The event loop drives [`FitTask::step`] repeatedly (e.g. one call per
//! scheduled macrotask) so the UI stays responsive. The cancellation token is
//! checked before each optimizer step and again before committing the step's
//! result, so a cancellation observed mid-step never overwrites the displayed
//! best-so-far with a partially committed update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::fit::FitState;
use crate::runner::FitOptimizer;

/// Shared flag observed between fit steps
///
/// The slices themselves are single-threaded; the token is the one value that
/// may be flipped from outside the reducer loop (e.g. a UI cancel handler),
/// hence the atomic.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a single [`FitTask::step`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Progress was committed; schedule another step
    Continue,
    /// The optimizer converged; the attempt is over
    Converged,
    /// Cancellation was observed; best-so-far remains displayed
    Cancelled,
    /// The optimizer failed; the error is recorded on the slice
    Failed,
}

/// An in-flight fit attempt
pub struct FitTask<'r> {
    optimizer: Box<dyn FitOptimizer + 'r>,
    token: CancellationToken,
}

impl std::fmt::Debug for FitTask<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitTask")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<'r> FitTask<'r> {
    pub fn new(optimizer: Box<dyn FitOptimizer + 'r>) -> Self {
        Self {
            optimizer,
            token: CancellationToken::new(),
        }
    }

    /// Handle with which the attempt can be cancelled from outside
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run one bounded optimizer step and commit its result to the slice
    pub fn step(&mut self, fit: &mut FitState) -> StepOutcome {
        if self.token.is_cancelled() {
            fit.mark_cancelled();
            return StepOutcome::Cancelled;
        }

        let converged = match self.optimizer.step() {
            Ok(converged) => converged,
            Err(e) => {
                fit.fail(e);
                return StepOutcome::Failed;
            }
        };

        if self.token.is_cancelled() {
            fit.mark_cancelled();
            return StepOutcome::Cancelled;
        }

        fit.commit_step(self.optimizer.result());
        if converged {
            fit.finish();
            StepOutcome::Converged
        } else {
            StepOutcome::Continue
        }
    }

    /// Drive the attempt until it converges, fails or is cancelled
    pub fn run_to_completion(&mut self, fit: &mut FitState, max_steps: usize) -> StepOutcome {
        let mut outcome = StepOutcome::Continue;
        for _ in 0..max_steps {
            outcome = self.step(fit);
            if outcome != StepOutcome::Continue {
                break;
            }
        }
        if outcome == StepOutcome::Continue {
            // step budget exhausted without convergence
            fit.finish();
        }
        outcome
    }
}
