//! Persisted handle to the shared validator process.

use serde::{Deserialize, Serialize};

/// The single long-lived validator shared by every team of a family.
///
/// Written once by whichever worker wins the initialisation lock and read by
/// every later launch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedValidatorState {
    pub process_id: u32,
    /// Base58 encoding of the 64-byte authority keypair.
    pub keypair: String,
    pub rpc_port: u16,
}
