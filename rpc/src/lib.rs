//! HTTP surface of the sandbox: the player-facing gateway and the filtered
//! JSON-RPC relay to instance nodes.

pub mod error;
pub mod gateway;
pub mod policy;
pub mod proxy;

pub use error::RpcError;
pub use gateway::{credential_document, router, serve, GatewayServer, GatewayState, RateLimit, Ticket};
pub use policy::{MethodPolicy, PolicyViolation};
pub use proxy::{error_document, ProxyOutcome, RejectReason, RpcProxy, UpstreamResponse};
