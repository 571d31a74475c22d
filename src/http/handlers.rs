//! Route handlers.

use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::http::request::{client_ip, request_id};
use crate::http::response::{data, success, ApiError};
use crate::http::server::AppState;
use crate::registry::{NodeFields, NodeFilter, NodePatch};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CheckHealthRequest {
    pub url: Option<String>,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e.body_text())))
}

/// `GET /api/hotnode`
pub async fn hot_node(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let origin = client_ip(&headers, peer, state.throttle.trusts_forwarded_for());
    tracing::debug!(request_id = %request_id(&headers), origin = %origin, "Selecting hot node");

    let node = state.director.select_node(&origin.to_string()).await?;
    Ok(data(node))
}

/// `GET /api/node/{owner}`
pub async fn node_by_owner(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Response, ApiError> {
    let node = state.director.lookup_owner(&owner)?;
    Ok(data(node))
}

/// `GET /api/nodes`
pub async fn list_nodes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let nodes = state.director.list_nodes(NodeFilter {
        enabled: query.enabled,
    })?;
    Ok(success(
        StatusCode::OK,
        json!({ "count": nodes.len(), "data": nodes }),
    ))
}

/// `POST /api/node`
pub async fn upsert_node(
    State(state): State<AppState>,
    body: Result<Json<NodeFields>, JsonRejection>,
) -> Result<Response, ApiError> {
    let upserted = state.director.upsert_node(json_body(body)?)?;
    let (status, message) = if upserted.created {
        (StatusCode::CREATED, "Node created")
    } else {
        (StatusCode::OK, "Node updated")
    };
    Ok(success(
        status,
        json!({ "message": message, "data": upserted.node }),
    ))
}

/// `PUT /api/node/{owner}`
pub async fn update_node(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    body: Result<Json<NodePatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let patch = json_body(body)?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No updatable fields provided".into()));
    }

    let node = state.director.update_node(&owner, patch)?;
    Ok(success(
        StatusCode::OK,
        json!({ "message": "Node updated", "data": node }),
    ))
}

/// `DELETE /api/node/{owner}`
pub async fn delete_node(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Response, ApiError> {
    let node = state.director.delete_node(&owner)?;
    Ok(success(
        StatusCode::OK,
        json!({ "message": "Node deleted", "data": node }),
    ))
}

/// `POST /api/check-health`
pub async fn check_health(
    State(state): State<AppState>,
    body: Result<Json<CheckHealthRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let raw = json_body(body)?
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::Validation {
            message: "Missing required fields: url".into(),
            missing: vec!["url"],
        })?;

    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid url '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(format!(
            "Unsupported url scheme '{}'",
            parsed.scheme()
        )));
    }

    let result = state.director.check_health(parsed.as_str()).await;
    Ok(data(result))
}

/// `GET /api/activity`
pub async fn activity(State(state): State<AppState>) -> Result<Response, ApiError> {
    let events = state.activity.recent();
    Ok(success(
        StatusCode::OK,
        json!({ "count": events.len(), "data": events }),
    ))
}

/// `GET /health`
pub async fn director_health(State(state): State<AppState>) -> Response {
    let mode = state.director.health().config().mode;
    success(
        StatusCode::OK,
        json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "healthMode": mode,
        }),
    )
}
