//! # Access Routes
//!
//! REST endpoints tool pages call before and after gated work.
//!
//! The caller's identity comes from the identity provider in front of this
//! service via headers:
//!
//! - `x-user-id`: signed-in user (optional)
//! - `x-access-level`: level name, `anonymous` when absent
//! - `x-anonymous-key`: anonymous bucket; falls back to the first
//!   `x-forwarded-for` address

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use crate::access::{
    AccessDecision, AccessLevel, ErrorResponse, Feature, FeatureAccessGate, GateError,
    SessionContext,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ACCESS_LEVEL_HEADER: &str = "x-access-level";
pub const ANONYMOUS_KEY_HEADER: &str = "x-anonymous-key";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Shared route state
#[derive(Clone)]
pub struct AccessState {
    gate: Arc<FeatureAccessGate>,
}

impl AccessState {
    pub fn new(gate: FeatureAccessGate) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }
}

/// Build access routes
pub fn access_routes(state: Arc<AccessState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/features", get(list_features))
        .route("/v1/policy", get(get_policy))
        .route("/v1/access", get(access_overview))
        .route("/v1/access/{feature}", get(check_access))
        .route("/v1/access/{feature}/usage", post(increment_usage))
        .route("/v1/access/{feature}/consume", post(consume))
        .with_state(state)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Session context from identity headers
pub fn session_from_headers(headers: &HeaderMap) -> Result<SessionContext, GateError> {
    let level = match header_value(headers, ACCESS_LEVEL_HEADER) {
        Some(name) => name.parse::<AccessLevel>()?,
        None => AccessLevel::Anonymous,
    };

    let anonymous_key = header_value(headers, ANONYMOUS_KEY_HEADER)
        .or_else(|| {
            header_value(headers, FORWARDED_FOR_HEADER)
                .and_then(|list| list.split(',').next())
                .map(str::trim)
        })
        .map(str::to_string);

    Ok(SessionContext {
        user_id: header_value(headers, USER_ID_HEADER).map(str::to_string),
        level,
        anonymous_key,
    })
}

/// Extractor wrapper for [`SessionContext`]
pub struct Session(pub SessionContext);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers)
            .map(Session)
            .map_err(error_response)
    }
}

fn parse_feature(name: &str) -> Result<Feature, Response> {
    name.parse::<Feature>().map_err(error_response)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct FeatureInfo {
    feature: Feature,
    title: &'static str,
}

/// Tool catalogue
async fn list_features() -> impl IntoResponse {
    let features: Vec<FeatureInfo> = Feature::ALL
        .iter()
        .map(|&feature| FeatureInfo {
            feature,
            title: feature.title(),
        })
        .collect();
    Json(features)
}

/// Effective policy table
async fn get_policy(State(state): State<Arc<AccessState>>) -> impl IntoResponse {
    Json(state.gate.policy().snapshot())
}

/// Access state of every tool for the caller
async fn access_overview(
    State(state): State<Arc<AccessState>>,
    Session(ctx): Session,
) -> impl IntoResponse {
    Json(state.gate.feature_overview(&ctx).await)
}

/// Check access without counting a use
async fn check_access(
    State(state): State<Arc<AccessState>>,
    Session(ctx): Session,
    Path(feature): Path<String>,
) -> Response {
    let feature = match parse_feature(&feature) {
        Ok(feature) => feature,
        Err(response) => return response,
    };
    let decision = state.gate.check_access(&ctx, feature).await;
    (StatusCode::OK, Json(decision)).into_response()
}

/// Record one use; always 204 for a known feature
async fn increment_usage(
    State(state): State<Arc<AccessState>>,
    Session(ctx): Session,
    Path(feature): Path<String>,
) -> Response {
    let feature = match parse_feature(&feature) {
        Ok(feature) => feature,
        Err(response) => return response,
    };
    state.gate.increment_usage(&ctx, feature).await;
    StatusCode::NO_CONTENT.into_response()
}

/// Check and count in one step
async fn consume(
    State(state): State<Arc<AccessState>>,
    Session(ctx): Session,
    Path(feature): Path<String>,
) -> Response {
    let feature = match parse_feature(&feature) {
        Ok(feature) => feature,
        Err(response) => return response,
    };
    let decision = state.gate.try_consume(&ctx, feature).await;
    let status = decision_status(&decision, feature, ctx.level);
    (status, Json(decision)).into_response()
}

/// Status code for a consume decision
fn decision_status(decision: &AccessDecision, feature: Feature, level: AccessLevel) -> StatusCode {
    match decision.denial_error(feature, level) {
        None => StatusCode::OK,
        Some(err) => {
            if !err.is_denial() {
                tracing::warn!(%feature, %level, error = %err, "consume answered unavailable");
            }
            status_of(&err)
        }
    }
}

fn status_of(err: &GateError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Convert error to HTTP response
fn error_response(err: GateError) -> Response {
    (status_of(&err), Json(ErrorResponse::from(err))).into_response()
}
