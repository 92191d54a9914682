//! Durable state for the sandbox orchestrator.
//!
//! Everything here is file-backed so that several gateway processes on one
//! machine observe the same instances:
//! - [`InstanceRegistry`] — by-uuid and by-team indexes over launched nodes
//! - [`PersistentStore`] — small JSON key-value file (shared validator handle)
//! - [`FileLock`] — `flock(2)` exclusion for first-time initialisation

pub mod error;
pub mod fs;
pub mod fs_registry;
pub mod kv;
pub mod lock;
pub mod registry;

pub use error::StoreError;
pub use fs_registry::FsRegistry;
pub use kv::PersistentStore;
pub use lock::FileLock;
pub use registry::InstanceRegistry;
