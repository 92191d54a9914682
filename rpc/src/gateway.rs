//! Player-facing HTTP gateway.
//!
//! Routes:
//! - `GET /launch` — start the ticket's instance and hand out credentials
//! - `GET /kill` — terminate it
//! - `GET /flag` — the flag, once the deployed challenge reports solved
//! - `GET /data` — credentials of the running instance
//! - `POST /{uuid}` — filtered JSON-RPC relay to the instance's node
//!
//! Each route has its own request budget per window, shared by all callers.
//! Requests over budget are refused with 429 rather than queued.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::error_handling::HandleErrorLayer;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::{self, HeaderValue};
use axum::http::request::Parts;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::buffer::BufferLayer;
use tower::limit::RateLimitLayer;
use tower::load_shed::error::Overloaded;
use tower::load_shed::LoadShedLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use sandbox_orchestrator::{DeployHandler, Orchestrator};
use sandbox_store::InstanceRegistry;
use sandbox_types::{BackendKind, InstanceId, NodeInfo, TeamId};
use sandbox_utils::format_duration;

use crate::proxy::{ProxyOutcome, RpcProxy};
use crate::RpcError;

pub const TICKET_HEADER: &str = "x-ticket";
pub const TICKET_COOKIE: &str = "ticket";

/// Requests waiting for the limiter's verdict, per route.
const RATE_LIMIT_QUEUE: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u64,
    pub per: Duration,
}

impl RateLimit {
    pub fn per_minute(requests: u64) -> Self {
        Self {
            requests,
            per: Duration::from_secs(60),
        }
    }
}

pub struct GatewayState {
    orchestrator: Arc<Orchestrator>,
    proxy: RpcProxy,
    deployer: Arc<dyn DeployHandler>,
    flag: String,
    /// Mint a throwaway ticket for callers that bring none.
    disable_ticket: bool,
    rate_limit: Option<RateLimit>,
}

impl GatewayState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        registry: Arc<dyn InstanceRegistry>,
        deployer: Arc<dyn DeployHandler>,
        flag: impl Into<String>,
    ) -> Result<Self, RpcError> {
        Ok(Self {
            orchestrator,
            proxy: RpcProxy::new(registry)?,
            deployer,
            flag: flag.into(),
            disable_ticket: false,
            rate_limit: None,
        })
    }

    pub fn disable_ticket(mut self, disable: bool) -> Self {
        self.disable_ticket = disable;
        self
    }

    /// Cap every route at `limit`. A zero request count disables limiting.
    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = (limit.requests > 0).then_some(limit);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

/// The caller's team, taken from the `X-Ticket` header or `ticket` cookie.
pub struct Ticket {
    team: TeamId,
    /// Set when the ticket was minted for this request and must be handed
    /// back as a cookie.
    minted: Option<String>,
}

impl Ticket {
    pub fn team(&self) -> &TeamId {
        &self.team
    }

    fn respond(self, body: Value) -> Response {
        let mut response = Json(body).into_response();
        if let Some(ticket) = self.minted {
            let cookie = format!("{TICKET_COOKIE}={ticket}; Path=/; SameSite=Lax");
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
        }
        response
    }
}

fn ticket_from_parts(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(TICKET_HEADER).and_then(|v| v.to_str().ok()) {
        if !value.trim().is_empty() {
            return Some(value.trim().to_string());
        }
    }
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TICKET_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[axum::async_trait]
impl FromRequestParts<Arc<GatewayState>> for Ticket {
    type Rejection = RpcError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<GatewayState>) -> Result<Self, Self::Rejection> {
        let (raw, minted) = match ticket_from_parts(parts) {
            Some(raw) => (raw, None),
            None if state.disable_ticket => {
                let bytes = sandbox_crypto::random_bytes::<16>()
                    .map_err(|e| RpcError::Internal(e.to_string()))?;
                let raw = hex::encode(bytes);
                (raw.clone(), Some(raw))
            }
            None => return Err(RpcError::MissingTicket),
        };
        let team = TeamId::new(raw).map_err(|e| RpcError::InvalidTicket(e.to_string()))?;
        Ok(Self { team, minted })
    }
}

/// What the player needs to reach and attack their instance. `{ORIGIN}` is
/// substituted by the frontend with the gateway's public origin.
pub fn credential_document(node: &NodeInfo, ttl: Duration) -> Value {
    let player = node.player();
    let (first, second, third) = match node.backend {
        BackendKind::Solana => (
            json!({ "PLAYER_KEYPAIR": player.map(|a| a.private_key.as_str()) }),
            json!({ "CTX_PUBKEY": node.context().map(|a| a.public_key.as_str()) }),
            json!({ "PROGRAM_ID": node.contract_addr }),
        ),
        BackendKind::Evm | BackendKind::Starknet => (
            json!({ "PRIVKEY": player.map(|a| a.private_key.as_str()) }),
            json!({ "SETUP_CONTRACT_ADDR": node.contract_addr }),
            json!({ "WALLET_ADDR": player.map(|a| a.address.as_str()) }),
        ),
    };
    json!({
        "0": { "RPC_URL": format!("{{ORIGIN}}/{}", node.uuid) },
        "1": first,
        "2": second,
        "3": third,
        "message": format!(
            "your private blockchain has been deployed, it will automatically terminate in {}",
            format_duration(ttl)
        ),
    })
}

async fn launch(State(state): State<Arc<GatewayState>>, ticket: Ticket) -> Result<Response, RpcError> {
    let node = state
        .orchestrator
        .start(ticket.team(), state.deployer.as_ref())
        .await?;
    Ok(ticket.respond(credential_document(&node, state.orchestrator.ttl())))
}

async fn kill(State(state): State<Arc<GatewayState>>, ticket: Ticket) -> Result<Response, RpcError> {
    state.orchestrator.terminate(ticket.team())?;
    Ok(ticket.respond(json!({ "message": "instance terminated" })))
}

async fn flag(State(state): State<Arc<GatewayState>>, ticket: Ticket) -> Result<Response, RpcError> {
    if !state.orchestrator.verify(ticket.team()).await? {
        return Err(RpcError::NotSolved);
    }
    info!(team = %ticket.team(), "flag handed out");
    let flag = state.flag.clone();
    Ok(ticket.respond(json!({ "message": flag })))
}

async fn data(State(state): State<Arc<GatewayState>>, ticket: Ticket) -> Result<Response, RpcError> {
    let node = state.orchestrator.instance(ticket.team())?;
    Ok(ticket.respond(credential_document(&node, state.orchestrator.ttl())))
}

async fn relay(
    State(state): State<Arc<GatewayState>>,
    Path(raw_uuid): Path<String>,
    body: Bytes,
) -> Result<Response, RpcError> {
    let uuid: InstanceId = raw_uuid
        .parse()
        .map_err(|_| RpcError::InvalidUuid(raw_uuid.clone()))?;
    match state.proxy.forward(&uuid, body).await? {
        ProxyOutcome::Forwarded(upstream) => {
            let mut response = Response::new(Body::from(upstream.body));
            *response.status_mut() = upstream.status;
            *response.headers_mut() = upstream.headers;
            Ok(response)
        }
        ProxyOutcome::Rejected { document, .. } => Ok(Json(document).into_response()),
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

async fn over_budget(err: BoxError) -> RpcError {
    if err.is::<Overloaded>() {
        RpcError::RateLimited
    } else {
        RpcError::Internal(err.to_string())
    }
}

/// Build the gateway routes. Must be called within a tokio runtime when a
/// rate limit is set, since each limiter runs as a task.
pub fn router(state: Arc<GatewayState>) -> Router {
    let mut router = Router::new()
        .route("/launch", get(launch))
        .route("/kill", get(kill))
        .route("/flag", get(flag))
        .route("/data", get(data))
        .route("/:uuid", post(relay));
    if let Some(limit) = state.rate_limit {
        router = router.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(over_budget))
                .layer(BufferLayer::new(RATE_LIMIT_QUEUE))
                .layer(LoadShedLayer::new())
                .layer(RateLimitLayer::new(limit.requests, limit.per)),
        );
    }
    router.layer(cors()).with_state(state)
}

/// Serve the gateway on an already-bound listener until `shutdown`
/// resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<GatewayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub struct GatewayServer {
    pub port: u16,
    pub state: Arc<GatewayState>,
}

impl GatewayServer {
    pub fn new(port: u16, state: Arc<GatewayState>) -> Self {
        Self { port, state }
    }

    /// Listen on all interfaces until `shutdown` resolves.
    pub async fn start(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("gateway listening on {}", addr);
        serve(listener, self.state.clone(), shutdown).await
    }
}
