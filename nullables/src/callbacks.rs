//! Nullable deploy and solved callbacks.

use async_trait::async_trait;
use sandbox_orchestrator::{DeployContext, DeployHandler, SolvedContext, SolvedPredicate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Returns a fixed address (or a fixed failure) and records every context.
pub struct NullDeployer {
    outcome: Result<String, String>,
    contexts: Mutex<Vec<DeployContext>>,
}

impl NullDeployer {
    pub fn returning(address: impl Into<String>) -> Self {
        Self {
            outcome: Ok(address.into()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn contexts(&self) -> Vec<DeployContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeployHandler for NullDeployer {
    async fn deploy(&self, ctx: DeployContext) -> Result<String, String> {
        self.contexts.lock().unwrap().push(ctx);
        self.outcome.clone()
    }
}

/// A solved flag flipped by the test, standing in for the mined solution.
#[derive(Default)]
pub struct NullSolvedPredicate {
    solved: AtomicBool,
    queried: Mutex<Vec<String>>,
}

impl NullSolvedPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_solved(&self, solved: bool) {
        self.solved.store(solved, Ordering::SeqCst);
    }

    /// Contract addresses queried so far.
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl SolvedPredicate for NullSolvedPredicate {
    async fn is_solved(&self, ctx: SolvedContext) -> Result<bool, String> {
        self.queried.lock().unwrap().push(ctx.contract_addr);
        Ok(self.solved.load(Ordering::SeqCst))
    }
}
