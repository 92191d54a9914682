//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the orchestrator (node processes, the
//! on-disk registry, OS signals, per-challenge deploy and solved scripts)
//! sits behind a trait. This crate provides in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record what they were asked to do
//! - Never spawn processes or touch the filesystem
//!
//! Usage: swap real implementations for nullables in tests.

pub mod callbacks;
pub mod launcher;
pub mod registry;
pub mod signaler;

pub use callbacks::{NullDeployer, NullSolvedPredicate};
pub use launcher::NullLauncher;
pub use registry::NullRegistry;
pub use signaler::RecordingSignaler;
