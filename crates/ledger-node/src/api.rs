use crate::{
    constants::PEER_HEADER,
    network::{Network, PeerId},
    node::Node,
    transport::HttpNetwork,
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{Block, ProtocolId};
use ledger_storage::EventKind;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub type HttpNode = Node<HttpNetwork>;
type AppState = Arc<HttpNode>;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Profile {
    pub id: PeerId,
    pub addresses: Vec<String>,
    pub protocols: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChainLength {
    pub length: usize,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MineRequest {
    pub data: String,
}

pub enum ApiError {
    NotFound,
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(node: Arc<HttpNode>) -> Router {
    // Chain payloads grow with the chain and are read whole, so they are not capped.
    let streams: Router<AppState> = Router::new()
        .route(ProtocolId::LatestBlock.as_str(), post(latest_block_stream))
        .route(ProtocolId::EntireChain.as_str(), post(entire_chain_stream))
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .merge(streams)
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/profile", get(profile))
        .route("/peers", get(peers))
        .route("/chain", get(chain))
        .route("/chain/length", get(chain_length))
        .route("/chain/latest", get(chain_latest))
        .route("/block/index/{index}", get(block_by_index))
        .route("/block/hash/{hash}", get(block_by_hash))
        .route("/mine", post(mine))
        .route("/log/event/{kind}", get(event_log))
        .route("/log/protocol/{kind}", get(protocol_log))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

async fn latest_block_stream(
    State(node): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    accept_stream(node, ProtocolId::LatestBlock, &headers, body).await
}

async fn entire_chain_stream(
    State(node): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    accept_stream(node, ProtocolId::EntireChain, &headers, body).await
}

// The body has been read to completion; the exchange is handled on its own task.
async fn accept_stream(
    node: AppState,
    protocol: ProtocolId,
    headers: &HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(from) = headers
        .get(PEER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(PeerId::new)
    else {
        warn!(%protocol, "inbound exchange without {PEER_HEADER} header");
        return StatusCode::BAD_REQUEST;
    };

    node.network().observe_inbound(&from);
    tokio::spawn(async move {
        node.handle_inbound(protocol, &body, &from).await;
    });
    StatusCode::ACCEPTED
}

async fn profile(State(node): State<AppState>) -> Json<Profile> {
    let id = node.network().local_peer();
    Json(Profile {
        addresses: vec![id.to_string()],
        id,
        protocols: ProtocolId::ALL.iter().map(|p| p.as_str().to_string()).collect(),
    })
}

async fn peers(State(node): State<AppState>) -> Json<Vec<PeerId>> {
    Json(node.network().list_peers())
}

async fn chain(State(node): State<AppState>) -> Json<Vec<Block>> {
    Json(node.ledger().blocks())
}

async fn chain_length(State(node): State<AppState>) -> Json<ChainLength> {
    Json(ChainLength {
        length: node.ledger().len(),
    })
}

async fn chain_latest(State(node): State<AppState>) -> Json<Block> {
    Json(node.ledger().latest())
}

async fn block_by_index(
    State(node): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    node.ledger()
        .block_by_index(index)
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn block_by_hash(
    State(node): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Block>, ApiError> {
    node.ledger()
        .block_by_hash(&hash)
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn mine(
    State(node): State<AppState>,
    Json(req): Json<MineRequest>,
) -> Result<Json<Block>, ApiError> {
    if req.data.trim().is_empty() {
        return Err(ApiError::BadRequest("data must not be empty".into()));
    }
    node.mine(req.data).await.map(Json).map_err(|e| {
        warn!("mining failed: {e}");
        ApiError::Internal(e.to_string())
    })
}

async fn event_log(
    State(node): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if kind == "list" {
        let names: Vec<&str> = EventKind::ALL.iter().map(|k| k.name()).collect();
        return Ok(Json(json!(names)));
    }
    let kind = EventKind::from_name(&kind)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown event kind {kind}")))?;
    let records = node
        .activity()
        .events(Some(kind))
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    Ok(Json(json!(records)))
}

async fn protocol_log(
    State(node): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if kind == "list" {
        let protocols: Vec<Value> = ProtocolId::ALL
            .iter()
            .map(|p| json!({ "protocol": p.as_str(), "name": p.name() }))
            .collect();
        return Ok(Json(json!(protocols)));
    }
    let protocol = ProtocolId::from_name(&kind)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown protocol {kind}")))?;
    let records = node
        .activity()
        .protocols(Some(protocol))
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    Ok(Json(json!(records)))
}
