//! Per-family JSON-RPC method policy.
//!
//! Players talk to their node only through the relay, so the policy is what
//! keeps node-administration and self-funding methods out of reach.

use serde_json::Value;
use std::fmt;

use sandbox_types::BackendKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodPolicy {
    /// Empty means every namespace is allowed.
    allowed_prefixes: &'static [&'static str],
    denied: &'static [&'static str],
}

/// Why a request was refused before reaching the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyViolation {
    /// `method` absent or not a string.
    MissingMethod,
    /// Batch element that is not a JSON object, or an empty batch.
    MalformedRequest,
    /// Method outside the allowed namespaces, or explicitly denied.
    Disallowed(String),
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMethod => f.write_str("request has no method"),
            Self::MalformedRequest => f.write_str("request is not a JSON-RPC object"),
            Self::Disallowed(method) => write!(f, "method {method} is not allowed"),
        }
    }
}

impl MethodPolicy {
    pub const EVM: Self = Self {
        allowed_prefixes: &["web3", "eth", "net"],
        denied: &["eth_sendUnsignedTransaction"],
    };

    pub const STARKNET: Self = Self {
        allowed_prefixes: &["starknet"],
        denied: &[],
    };

    pub const SOLANA: Self = Self {
        allowed_prefixes: &[],
        denied: &["requestAirdrop"],
    };

    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Evm => Self::EVM,
            BackendKind::Starknet => Self::STARKNET,
            BackendKind::Solana => Self::SOLANA,
        }
    }

    pub fn permits(&self, method: &str) -> bool {
        let namespace_ok = self.allowed_prefixes.is_empty()
            || self.allowed_prefixes.iter().any(|p| method.starts_with(p));
        namespace_ok && !self.denied.contains(&method)
    }

    /// Check one JSON-RPC request object.
    pub fn check_request(&self, request: &Value) -> Result<(), PolicyViolation> {
        let object = request.as_object().ok_or(PolicyViolation::MalformedRequest)?;
        let method = object
            .get("method")
            .and_then(Value::as_str)
            .ok_or(PolicyViolation::MissingMethod)?;
        if self.permits(method) {
            Ok(())
        } else {
            Err(PolicyViolation::Disallowed(method.to_string()))
        }
    }

    /// Check a single request or a batch; one bad element rejects the batch.
    pub fn check(&self, body: &Value) -> Result<(), PolicyViolation> {
        match body {
            Value::Array(batch) if batch.is_empty() => Err(PolicyViolation::MalformedRequest),
            Value::Array(batch) => batch.iter().try_for_each(|r| self.check_request(r)),
            single => self.check_request(single),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn evm_namespaces() {
        let p = MethodPolicy::EVM;
        assert!(p.permits("eth_blockNumber"));
        assert!(p.permits("eth_sendRawTransaction"));
        assert!(p.permits("net_version"));
        assert!(p.permits("web3_clientVersion"));
        assert!(!p.permits("eth_sendUnsignedTransaction"));
        assert!(!p.permits("anvil_setBalance"));
        assert!(!p.permits("evm_mine"));
        assert!(!p.permits("debug_traceTransaction"));
    }

    #[test]
    fn starknet_single_namespace() {
        let p = MethodPolicy::STARKNET;
        assert!(p.permits("starknet_call"));
        assert!(!p.permits("devnet_mint"));
    }

    #[test]
    fn solana_denylist_only() {
        let p = MethodPolicy::SOLANA;
        assert!(p.permits("getBalance"));
        assert!(p.permits("sendTransaction"));
        assert!(!p.permits("requestAirdrop"));
    }

    #[test]
    fn method_must_be_a_string() {
        let p = MethodPolicy::EVM;
        assert_eq!(p.check(&json!({"id": 1})), Err(PolicyViolation::MissingMethod));
        assert_eq!(
            p.check(&json!({"id": 1, "method": 7})),
            Err(PolicyViolation::MissingMethod)
        );
        assert_eq!(p.check(&json!("eth_call")), Err(PolicyViolation::MalformedRequest));
    }

    #[test]
    fn batch_is_rejected_by_any_element() {
        let p = MethodPolicy::EVM;
        let ok = json!([
            {"jsonrpc": "2.0", "id": 1, "method": "eth_chainId"},
            {"jsonrpc": "2.0", "id": 2, "method": "eth_blockNumber"},
        ]);
        assert!(p.check(&ok).is_ok());

        let bad = json!([
            {"jsonrpc": "2.0", "id": 1, "method": "eth_chainId"},
            {"jsonrpc": "2.0", "id": 2, "method": "anvil_impersonateAccount"},
        ]);
        assert_eq!(
            p.check(&bad),
            Err(PolicyViolation::Disallowed("anvil_impersonateAccount".into()))
        );
        assert_eq!(p.check(&json!([])), Err(PolicyViolation::MalformedRequest));
    }

    proptest! {
        #[test]
        fn evm_permits_exactly_allowed_namespaces(method in "[a-zA-Z_]{0,24}") {
            let expected = ["web3", "eth", "net"].iter().any(|p| method.starts_with(p))
                && method != "eth_sendUnsignedTransaction";
            prop_assert_eq!(MethodPolicy::EVM.permits(&method), expected);
        }

        #[test]
        fn solana_refuses_only_airdrops(method in "[a-zA-Z]{1,24}") {
            prop_assert_eq!(MethodPolicy::SOLANA.permits(&method), method != "requestAirdrop");
        }

        #[test]
        fn starknet_refuses_other_namespaces(suffix in "[a-z_]{0,16}") {
            let starknet = format!("starknet_{suffix}");
            let devnet = format!("devnet_{suffix}");
            prop_assert!(MethodPolicy::STARKNET.permits(&starknet));
            prop_assert!(!MethodPolicy::STARKNET.permits(&devnet));
        }

        #[test]
        fn one_denied_element_rejects_any_batch(
            allowed in proptest::collection::vec("eth_[a-zA-Z]{1,12}", 0..6),
            position in 0usize..6,
        ) {
            let mut batch: Vec<Value> = allowed
                .iter()
                .filter(|m| m.as_str() != "eth_sendUnsignedTransaction")
                .enumerate()
                .map(|(i, m)| json!({"jsonrpc": "2.0", "id": i, "method": m}))
                .collect();
            let at = position.min(batch.len());
            batch.insert(at, json!({"jsonrpc": "2.0", "id": 99, "method": "eth_sendUnsignedTransaction"}));
            prop_assert!(MethodPolicy::EVM.check(&Value::Array(batch)).is_err());
        }
    }
}
