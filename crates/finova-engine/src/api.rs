//! REST surface over the reward engine
//!
//! Ids arrive as plain strings and are validated here; engine errors map to
//! JSON bodies of the form `{ "error": kind, "message": ..., "retry_after_ms"? }`.

use crate::engine::{
    ActivityOutcome, MiningRate, MiningStarted, MiningStopped, NetworkSnapshot, ReferralApplied,
    RewardEngine, StakeReceipt, UserProfile,
};
use crate::metrics;
use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use finova_common::{
    ActivityPayload, ActivityType, CardEffect, CardKind, ErrorClass, EventId, FinovaError,
    GuildId, IdentitySignal, Platform, SessionId, TrustEvidence, UserId,
};
use finova_rewards::Unstake;
use finova_trust::TrustUpdate;
use prometheus::Registry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RewardEngine>,
    pub registry: Arc<Registry>,
}

/// Engine error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub FinovaError);

impl From<FinovaError> for ApiError {
    fn from(err: FinovaError) -> Self {
        ApiError(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

pub fn status_for(err: &FinovaError) -> StatusCode {
    match err {
        FinovaError::CycleOrDuplicateParent { .. }
        | FinovaError::SessionAlreadyActive
        | FinovaError::SessionNotActive
        | FinovaError::InsufficientBalance { .. } => StatusCode::CONFLICT,
        FinovaError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        FinovaError::Unauthorized | FinovaError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
        other => match other.class() {
            ErrorClass::Validation => StatusCode::BAD_REQUEST,
            ErrorClass::Remediation => StatusCode::FORBIDDEN,
            ErrorClass::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorClass::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
            retry_after_ms: self.0.retry_after().map(|d| d.as_millis() as u64),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============ REQUEST TYPES ============

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
    pub identity: Option<IdentitySignal>,
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user_id: String,
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub user_id: String,
    pub platform: Platform,
    pub activity_type: ActivityType,
    #[serde(default = "ActivityPayload::new")]
    pub payload: ActivityPayload,
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReferralRequest {
    pub user_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct StakeRequest {
    pub user_id: String,
    pub amount: Decimal,
    pub duration_days: u32,
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CardRequest {
    pub user_id: String,
    pub kind: CardKind,
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EvidenceRequest {
    pub user_id: String,
    pub evidence: TrustEvidence,
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    pub user_id: String,
    pub signal: IdentitySignal,
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GuildRequest {
    pub user_id: String,
    pub guild_id: String,
    pub event_id: String,
}

// ============ HANDLERS ============

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": finova_common::VERSION,
    }))
}

async fn get_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = metrics::render(&state.registry)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}

async fn get_network(State(state): State<AppState>) -> Json<NetworkSnapshot> {
    Json(NetworkSnapshot::clone(&state.engine.network_snapshot()))
}

async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let profile = state
        .engine
        .register_user(UserId::new(req.user_id)?, req.identity)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_user(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<UserProfile> {
    Ok(Json(state.engine.user_profile(&UserId::new(user_id)?)?))
}

async fn get_rate(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<MiningRate> {
    Ok(Json(state.engine.get_mining_rate(&UserId::new(user_id)?)?))
}

async fn start_mining(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> ApiResult<MiningStarted> {
    let started = state
        .engine
        .start_mining(&UserId::new(req.user_id)?, EventId::new(req.event_id)?)
        .await?;
    Ok(Json(started))
}

async fn stop_mining(
    State(state): State<AppState>,
    Json(req): Json<StopRequest>,
) -> ApiResult<MiningStopped> {
    let session_id: SessionId = req.session_id.parse()?;
    Ok(Json(state.engine.stop_mining(session_id).await?))
}

async fn record_activity(
    State(state): State<AppState>,
    Json(req): Json<ActivityRequest>,
) -> ApiResult<ActivityOutcome> {
    let outcome = state
        .engine
        .record_activity(
            &UserId::new(req.user_id)?,
            req.platform,
            req.activity_type,
            req.payload,
            EventId::new(req.event_id)?,
        )
        .await?;
    Ok(Json(outcome))
}

async fn apply_referral(
    State(state): State<AppState>,
    Json(req): Json<ReferralRequest>,
) -> ApiResult<ReferralApplied> {
    let applied = state
        .engine
        .apply_referral_code(&UserId::new(req.user_id)?, &req.code)
        .await?;
    Ok(Json(applied))
}

async fn stake(State(state): State<AppState>, Json(req): Json<StakeRequest>) -> ApiResult<StakeReceipt> {
    let receipt = state
        .engine
        .stake_fin(
            &UserId::new(req.user_id)?,
            req.amount,
            req.duration_days,
            EventId::new(req.event_id)?,
        )
        .await?;
    Ok(Json(receipt))
}

async fn unstake(State(state): State<AppState>, Json(req): Json<UserRequest>) -> ApiResult<Unstake> {
    let unstake = state
        .engine
        .unstake(&UserId::new(req.user_id)?, EventId::new(req.event_id)?)
        .await?;
    Ok(Json(unstake))
}

async fn use_card(State(state): State<AppState>, Json(req): Json<CardRequest>) -> ApiResult<CardEffect> {
    let card = state
        .engine
        .use_card(&UserId::new(req.user_id)?, req.kind, EventId::new(req.event_id)?)
        .await?;
    Ok(Json(card))
}

async fn submit_evidence(
    State(state): State<AppState>,
    Json(req): Json<EvidenceRequest>,
) -> ApiResult<TrustUpdate> {
    let update = state
        .engine
        .submit_trust_evidence(&UserId::new(req.user_id)?, req.evidence, EventId::new(req.event_id)?)
        .await?;
    Ok(Json(update))
}

async fn submit_proof(
    State(state): State<AppState>,
    Json(req): Json<EvidenceRequest>,
) -> ApiResult<TrustUpdate> {
    let update = state
        .engine
        .submit_humanity_proof(&UserId::new(req.user_id)?, req.evidence, EventId::new(req.event_id)?)
        .await?;
    Ok(Json(update))
}

async fn apply_identity(
    State(state): State<AppState>,
    Json(req): Json<IdentityRequest>,
) -> ApiResult<TrustUpdate> {
    let update = state
        .engine
        .apply_identity_signal(&UserId::new(req.user_id)?, req.signal, EventId::new(req.event_id)?)
        .await?;
    Ok(Json(update))
}

async fn join_guild(
    State(state): State<AppState>,
    Json(req): Json<GuildRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .join_guild(
            &UserId::new(req.user_id)?,
            GuildId::new(req.guild_id)?,
            EventId::new(req.event_id)?,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_guild(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .leave_guild(&UserId::new(req.user_id)?, EventId::new(req.event_id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/network", get(get_network))
        // Users
        .route("/users", post(register_user))
        .route("/users/:user_id", get(get_user))
        .route("/users/:user_id/rate", get(get_rate))
        // Mining
        .route("/mining/start", post(start_mining))
        .route("/mining/stop", post(stop_mining))
        // Rewards
        .route("/activities", post(record_activity))
        .route("/referrals", post(apply_referral))
        .route("/staking", post(stake))
        .route("/staking/unstake", post(unstake))
        .route("/cards", post(use_card))
        .route("/guilds/join", post(join_guild))
        .route("/guilds/leave", post(leave_guild))
        // Trust
        .route("/trust/evidence", post(submit_evidence))
        .route("/trust/humanity-proof", post(submit_proof))
        .route("/trust/identity", post(apply_identity))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
