mod config;
mod error;
mod rate_limit;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ayurwell_assist::{
    AssistError, Assistants, ContentRequest, GeneratedContent, SynthesisRequest,
    SynthesizedSpeech, Transcription, TranscriptionRequest,
};
use ayurwell_core::{
    constitution_profile, AnswerSet, ClassificationResult, ConstitutionProfile, DailySchedule,
    DietPlan, Dosha, FollowUpDraft, HistoryView, PrakritiClassifier, PrakritiRecord,
    ProfileUpdate, ResolvedSession, SessionContext, UserIdentity, QUESTION_COUNT,
};
use ayurwell_observability::{AppMetrics, MetricsSnapshot};
use ayurwell_storage::Store;
use ayurwell_wellness::WellnessService;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::{rng, Rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

pub use config::{ApiConfig, DEFAULT_ADMIN_EMAILS, DEFAULT_API_KEY};
pub use error::ApiError;

use crate::rate_limit::IpRateLimiter;

const MAX_JSON_BODY_BYTES: usize = 64 * 1024;
const MAX_AUDIO_BODY_BYTES: usize = 8 * 1024 * 1024;
const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Clone)]
#[allow(private_interfaces)]
pub struct ApiState {
    pub service: Arc<WellnessService<Store>>,
    pub assistants: Assistants,
    pub metrics: Arc<AppMetrics>,
    pub config: Arc<ApiConfig>,
    pub limiter: IpRateLimiter,
    pub auth_limiter: IpRateLimiter,
    pub storage_backend: &'static str,
}

impl ApiState {
    /// Forgets rate-limit keys whose window has fully elapsed.
    pub fn prune_rate_limits(&self) -> usize {
        self.limiter.prune() + self.auth_limiter.prune()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    storage: &'static str,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    content_generation: bool,
    speech: bool,
    tie_break: &'static str,
    question_count: usize,
}

#[derive(Debug, Deserialize)]
struct AnswersRequest {
    answers: AnswerSet,
}

#[derive(Debug, Serialize)]
struct ClassifyResponse {
    #[serde(flatten)]
    result: ClassificationResult,
    contenders: Vec<Dosha>,
    profile: ConstitutionProfile,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    result_id: String,
    #[serde(flatten)]
    result: ClassificationResult,
    created_at: DateTime<Utc>,
    contenders: Vec<Dosha>,
    profile: ConstitutionProfile,
}

#[derive(Debug, Deserialize)]
struct FollowUpDeleteRequest {
    follow_up_id: String,
}

#[derive(Debug, Deserialize)]
struct SignInRequest {
    email: String,
}

pub async fn build_app() -> Result<Router> {
    build_app_with_config(ApiConfig::from_env()).await
}

pub async fn build_app_with_config(config: ApiConfig) -> Result<Router> {
    let state = build_state(config).await?;
    Ok(build_router(state))
}

pub async fn build_state(config: ApiConfig) -> Result<ApiState> {
    let metrics = AppMetrics::shared();

    let store = match config.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url)
            .await
            .context("failed to open wellness store")?,
        None => Store::memory(),
    };
    let storage_backend = store.backend_name();

    let service = Arc::new(WellnessService::new(
        Arc::new(store),
        PrakritiClassifier::new(QUESTION_COUNT, config.tie_break),
        metrics.clone(),
    ));

    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;
    let assistants = Assistants::new(http_client, config.assist.clone());

    info!(
        storage = storage_backend,
        tie_break = config.tie_break.as_str(),
        content_generation = assistants.status().content,
        speech = assistants.status().speech,
        "wellness api configured"
    );

    Ok(ApiState {
        service,
        assistants,
        metrics,
        limiter: IpRateLimiter::new(config.api_rate_limit_window, config.api_rate_limit_max),
        auth_limiter: IpRateLimiter::new(config.auth_rate_limit_window, config.auth_rate_limit_max),
        config: Arc::new(config),
        storage_backend,
    })
}

pub fn build_router(state: ApiState) -> Router {
    // Recorded audio is far larger than any other payload.
    let audio_routes: Router<ApiState> = Router::new()
        .route("/v1/assist/voice_to_text", post(assist_voice_to_text))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_AUDIO_BODY_BYTES));

    Router::new()
        .route("/health", get(health))
        .route("/v1/prakriti/questions", get(prakriti_questions))
        .route("/v1/prakriti/classify", post(prakriti_classify))
        .route("/v1/prakriti/submit", post(prakriti_submit))
        .route("/v1/prakriti/latest", get(prakriti_latest))
        .route("/v1/prakriti/history", get(prakriti_history))
        .route("/v1/diet", get(diet_chart))
        .route("/v1/schedule", get(daily_schedule))
        .route(
            "/v1/follow_ups",
            get(follow_ups_list).post(follow_up_create),
        )
        .route("/v1/follow_ups/delete", post(follow_up_delete))
        .route("/v1/profile", get(profile_get).post(profile_save))
        .route("/v1/history", get(history))
        .route("/v1/auth/sign_in", post(auth_sign_in))
        .route("/v1/auth/sign_out", post(auth_sign_out))
        .route("/v1/auth/me", get(auth_me))
        .route("/v1/admin/stats", get(admin_stats))
        .route("/v1/admin/activity", get(admin_activity))
        .route("/v1/assist/content", post(assist_content))
        .route("/v1/assist/text_to_voice", post(assist_text_to_voice))
        .layer(RequestBodyLimitLayer::new(MAX_JSON_BODY_BYTES))
        .merge(audio_routes)
        .layer(build_cors_layer(&state.config.allowed_origins))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            request_metrics_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        // Cookie-authenticated writes are origin-checked before key handling.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            csrf_origin_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let assist = state.assistants.status();
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: Utc::now().to_rfc3339(),
        storage: state.storage_backend,
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            content_generation: assist.content,
            speech: assist.speech,
            tie_break: state.config.tie_break.as_str(),
            question_count: state.service.classifier().expected_answers(),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn prakriti_questions(State(state): State<ApiState>) -> impl IntoResponse {
    let questions = state.service.questions();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "count": questions.len(),
            "questions": questions
        })),
    )
}

async fn prakriti_classify(
    State(state): State<ApiState>,
    payload: Result<Json<AnswersRequest>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let input = answers_payload(payload)?;
    let result = state.service.classify(&input.answers)?;

    Ok(Json(ClassifyResponse {
        contenders: result.contenders(),
        profile: constitution_profile(result.prakriti_type),
        result,
    }))
}

async fn prakriti_submit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<AnswersRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let input = answers_payload(payload)?;
    let record = state
        .service
        .submit_questionnaire(&user.user_id, &input.answers)
        .await?;
    let result = record.classification();

    Ok(Json(SubmitResponse {
        result_id: record.result_id,
        contenders: result.contenders(),
        profile: constitution_profile(result.prakriti_type),
        created_at: record.created_at,
        result,
    }))
}

/// Answers that are not strings or `null` fail before reaching the classifier.
fn answers_payload(
    payload: Result<Json<AnswersRequest>, JsonRejection>,
) -> Result<AnswersRequest, ApiError> {
    match payload {
        Ok(Json(input)) => Ok(input),
        Err(JsonRejection::JsonDataError(err)) => Err(ApiError::MalformedAnswers(err.body_text())),
        Err(rejection) => Err(ApiError::Body(rejection)),
    }
}

async fn prakriti_latest(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let latest = state.service.latest_result(&user.user_id).await?;
    let profile = latest
        .as_ref()
        .map(|record| constitution_profile(record.prakriti_type));

    Ok(Json(serde_json::json!({
        "result": latest.as_ref().map(record_view),
        "profile": profile
    })))
}

async fn prakriti_history(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let results = state.service.result_history(&user.user_id).await?;

    Ok(Json(serde_json::json!({
        "results": results.iter().map(record_view).collect::<Vec<_>>()
    })))
}

async fn diet_chart(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<DietPlan>, ApiError> {
    let user = require_user(&state, &headers).await?;
    state
        .service
        .diet_chart(&user.user_id)
        .await?
        .map(Json)
        .ok_or(PRAKRITI_REQUIRED)
}

async fn daily_schedule(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<DailySchedule>, ApiError> {
    let user = require_user(&state, &headers).await?;
    state
        .service
        .daily_schedule(&user.user_id)
        .await?
        .map(Json)
        .ok_or(PRAKRITI_REQUIRED)
}

const PRAKRITI_REQUIRED: ApiError = ApiError::NotFound {
    code: "prakriti_required",
    message: "complete the Prakriti questionnaire first",
};

async fn follow_ups_list(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let follow_ups = state.service.list_follow_ups(&user.user_id).await?;

    Ok(Json(serde_json::json!({ "follow_ups": follow_ups })))
}

async fn follow_up_create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(input): Json<FollowUpDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let item = state.service.add_follow_up(&user.user_id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "ok": true,
            "follow_up": item
        })),
    ))
}

async fn follow_up_delete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(input): Json<FollowUpDeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    state
        .service
        .delete_follow_up(&user.user_id, input.follow_up_id.trim())
        .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn profile_get(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let profile = state.service.load_profile(&user).await?;

    Ok(Json(serde_json::json!({ "profile": profile })))
}

async fn profile_save(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(input): Json<ProfileUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let profile = state.service.save_profile(&user, input).await?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "profile": profile
    })))
}

async fn history(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<HistoryView>, ApiError> {
    let user = require_user(&state, &headers).await?;
    Ok(Json(state.service.history(&user.user_id).await?))
}

async fn auth_sign_in(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(input): Json<SignInRequest>,
) -> Result<Response, ApiError> {
    // Identity comes from a trusted upstream; browsers cannot mint sessions.
    if !has_service_api_key(&state, &headers) {
        return Err(ApiError::Forbidden {
            code: "service_key_required",
            message: "sign-in requires the service x-api-key",
        });
    }

    let grant_admin = state.config.is_admin_email(&input.email);
    let (profile, role) = state
        .service
        .ensure_account(&input.email, grant_admin)
        .await?;

    let token = generate_urlsafe_token(SESSION_TOKEN_BYTES);
    let ttl = chrono::Duration::from_std(state.config.session_ttl)
        .unwrap_or_else(|_| chrono::Duration::days(30));
    state
        .service
        .open_session(token.clone(), &profile.user_id, ttl)
        .await?;
    info!(user_id = %profile.user_id, role = role.as_str(), "session opened");

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({
            "ok": true,
            "user": profile,
            "role": role
        })),
    )
        .into_response();
    attach_cookie(
        &mut response,
        &session_cookie_header(&state.config, &token, state.config.session_ttl),
    );
    Ok(response)
}

async fn auth_sign_out(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = read_cookie_value(&headers, &state.config.cookie_name) {
        state.service.close_session(&token).await?;
    }

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({
            "ok": true
        })),
    )
        .into_response();
    attach_cookie(
        &mut response,
        &session_cookie_header(&state.config, "", Duration::ZERO),
    );
    Ok(response)
}

async fn auth_me(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = session_from_headers(&state, &headers).await?;
    let user = session.current_user().ok_or(ApiError::NotAuthenticated)?;
    let profile = state.service.load_profile(&user).await?;

    Ok(Json(serde_json::json!({
        "user": profile,
        "role": session.current_role(),
        "is_admin": session.is_admin()
    })))
}

async fn admin_stats(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let stats = state.service.admin_stats().await?;

    Ok(Json(serde_json::json!({ "stats": stats })))
}

async fn admin_activity(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let items = state.service.recent_activity().await?;

    Ok(Json(serde_json::json!({ "items": items })))
}

async fn assist_content(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(mut input): Json<ContentRequest>,
) -> Result<Json<GeneratedContent>, ApiError> {
    let user = require_user(&state, &headers).await?;
    if input.user_profile.is_none() {
        input.user_profile = Some(assist_profile_context(&state, &user).await?);
    }

    state.metrics.inc_assist_call("content");
    let outcome = state.assistants.content.generate(&input).await;
    record_assist_outcome(&state.metrics, "content", outcome).map(Json)
}

async fn assist_text_to_voice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(input): Json<SynthesisRequest>,
) -> Result<Json<SynthesizedSpeech>, ApiError> {
    require_user(&state, &headers).await?;

    state.metrics.inc_assist_call("text_to_voice");
    let outcome = state.assistants.synthesizer.synthesize(&input).await;
    record_assist_outcome(&state.metrics, "text_to_voice", outcome).map(Json)
}

async fn assist_voice_to_text(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(input): Json<TranscriptionRequest>,
) -> Result<Json<Transcription>, ApiError> {
    require_user(&state, &headers).await?;

    state.metrics.inc_assist_call("voice_to_text");
    let outcome = state.assistants.recognizer.transcribe(&input).await;
    record_assist_outcome(&state.metrics, "voice_to_text", outcome).map(Json)
}

fn record_assist_outcome<T>(
    metrics: &AppMetrics,
    kind: &'static str,
    outcome: Result<T, AssistError>,
) -> Result<T, ApiError> {
    outcome.map_err(|err| {
        metrics.inc_assist_failure(kind);
        warn!(kind, error = %err, "assist call failed");
        ApiError::from(err)
    })
}

/// Profile context handed to content generation when the caller sends none.
async fn assist_profile_context(
    state: &ApiState,
    user: &UserIdentity,
) -> Result<serde_json::Value, ApiError> {
    let profile = state.service.load_profile(user).await?;
    let latest = state.service.latest_result(&user.user_id).await?;

    Ok(serde_json::json!({
        "name": profile.name,
        "age": profile.age,
        "gender": profile.gender,
        "prakriti": latest.map(|record| record.prakriti_type.label())
    }))
}

fn record_view(record: &PrakritiRecord) -> serde_json::Value {
    serde_json::json!({
        "result_id": record.result_id,
        "prakritiType": record.prakriti_type,
        "score": record.score,
        "created_at": record.created_at
    })
}

async fn session_from_headers(
    state: &ApiState,
    headers: &HeaderMap,
) -> Result<ResolvedSession, ApiError> {
    let Some(token) = read_cookie_value(headers, &state.config.cookie_name) else {
        return Ok(ResolvedSession::default());
    };
    Ok(state
        .service
        .resolve_session(&token)
        .await?
        .unwrap_or_default())
}

async fn require_user(state: &ApiState, headers: &HeaderMap) -> Result<UserIdentity, ApiError> {
    session_from_headers(state, headers)
        .await?
        .current_user()
        .ok_or(ApiError::NotAuthenticated)
}

async fn require_admin(state: &ApiState, headers: &HeaderMap) -> Result<UserIdentity, ApiError> {
    let session = session_from_headers(state, headers).await?;
    let user = session.current_user().ok_or(ApiError::NotAuthenticated)?;
    if !session.is_admin() {
        return Err(ApiError::AdminRequired);
    }
    Ok(user)
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if request.method() == Method::OPTIONS || is_public_endpoint(path.as_str()) {
        return next.run(request).await;
    }

    if has_service_api_key(&state, request.headers()) {
        return next.run(request).await;
    }

    // First-party browser origins are accepted without x-api-key.
    if !request_origin_is_allowed(&state, request.headers()) {
        return rejection(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "send the service x-api-key or call from an allowed origin",
        );
    }

    next.run(request).await
}

fn rejection(status: StatusCode, error: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": error,
            "message": message
        })),
    )
        .into_response()
}

fn has_service_api_key(state: &ApiState, headers: &HeaderMap) -> bool {
    headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == state.config.api_key)
        .unwrap_or(false)
}

fn read_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let raw_cookie = headers.get(header::COOKIE)?.to_str().ok()?;
    raw_cookie.split(';').find_map(|part| {
        let mut split = part.trim().splitn(2, '=');
        let key = split.next()?.trim();
        let value = split.next()?.trim();
        if key == cookie_name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

fn request_origin_is_allowed(state: &ApiState, headers: &HeaderMap) -> bool {
    request_origin_from_headers(headers)
        .map(|origin| {
            state
                .config
                .allowed_origins
                .iter()
                .any(|allowed| *allowed == origin)
        })
        .unwrap_or(false)
}

fn request_origin_from_headers(headers: &HeaderMap) -> Option<String> {
    let direct_origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty());
    if direct_origin.is_some() {
        return direct_origin;
    }

    headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Url::parse(value).ok())
        .map(|url| url.origin().ascii_serialization())
        .filter(|value| value != "null")
}

fn cookie_same_site_attr(value: &str) -> &'static str {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" => "None",
        "lax" => "Lax",
        _ => "Strict",
    }
}

/// `Set-Cookie` value for the session cookie. A zero max-age with an empty
/// token clears it.
fn session_cookie_header(config: &ApiConfig, token: &str, max_age: Duration) -> String {
    let mut attributes = vec![
        format!("{}={token}", config.cookie_name),
        "Path=/".to_string(),
        "HttpOnly".to_string(),
        format!("SameSite={}", cookie_same_site_attr(&config.cookie_same_site)),
        format!("Max-Age={}", max_age.as_secs()),
    ];
    if max_age.is_zero() {
        attributes.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string());
    }
    if config.cookie_secure {
        attributes.push("Secure".to_string());
    }
    if !config.cookie_domain.is_empty() {
        attributes.push(format!("Domain={}", config.cookie_domain));
    }
    attributes.join("; ")
}

fn attach_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
}

fn generate_urlsafe_token(bytes: usize) -> String {
    let mut buffer = vec![0_u8; bytes];
    rng().fill_bytes(buffer.as_mut_slice());
    URL_SAFE_NO_PAD.encode(buffer)
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health" | "/v1/prakriti/questions")
}

fn is_auth_rate_limited_endpoint(path: &str) -> bool {
    matches!(path, "/v1/auth/sign_in")
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:5173")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
        .allow_credentials(true)
}

async fn request_metrics_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    state.metrics.inc_request();
    state.metrics.observe_latency(started.elapsed());
    response
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let ip = request_ip(&request);

    if is_auth_rate_limited_endpoint(path.as_str()) {
        let auth_key = format!("auth:{}:{}", path, ip);
        if !state.auth_limiter.allow(&auth_key) {
            return rejection(
                StatusCode::TOO_MANY_REQUESTS,
                "auth_rate_limited",
                "too many sign-in attempts, retry in a minute",
            );
        }
    }

    if is_public_endpoint(path.as_str()) {
        return next.run(request).await;
    }

    if !state.limiter.allow(&ip) {
        return rejection(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "too many requests from this client",
        );
    }

    next.run(request).await
}

async fn csrf_origin_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::GET
        || request.method() == Method::HEAD
        || request.method() == Method::OPTIONS
    {
        return next.run(request).await;
    }

    let has_cookie_session =
        read_cookie_value(request.headers(), &state.config.cookie_name).is_some();
    if !has_cookie_session || has_service_api_key(&state, request.headers()) {
        return next.run(request).await;
    }

    let Some(origin) = request_origin_from_headers(request.headers()) else {
        return rejection(
            StatusCode::FORBIDDEN,
            "origin_required",
            "cookie-authenticated writes must send an Origin or Referer header",
        );
    };

    if !state.config.allowed_origins.iter().any(|value| *value == origin) {
        return rejection(
            StatusCode::FORBIDDEN,
            "origin_not_allowed",
            "request origin is not in AYURWELL_ALLOWED_ORIGINS",
        );
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .next()
                .unwrap_or("unknown")
                .trim()
                .to_string()
        })
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; base-uri 'none'"),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    if state.config.cookie_secure {
        response.headers_mut().insert(
            header::HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{
        generate_urlsafe_token, is_public_endpoint, read_cookie_value,
        request_origin_from_headers, session_cookie_header, ApiConfig,
    };
    use axum::http::{header, HeaderMap, HeaderValue};

    #[test]
    fn session_cookie_carries_configured_attributes() {
        let config = ApiConfig {
            cookie_domain: "ayurwell.app".to_string(),
            ..ApiConfig::default()
        };
        let cookie = session_cookie_header(&config, "token123", Duration::from_secs(3600));
        assert!(cookie.starts_with("ayurwell_session=token123;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("Domain=ayurwell.app"));
        assert!(!cookie.contains("Expires="));
    }

    #[test]
    fn clearing_cookie_expires_it_immediately() {
        let config = ApiConfig {
            cookie_same_site: "lax".to_string(),
            cookie_secure: false,
            cookie_domain: String::new(),
            ..ApiConfig::default()
        };
        let cookie = session_cookie_header(&config, "", Duration::ZERO);
        assert!(cookie.starts_with("ayurwell_session=;"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970"));
        assert!(!cookie.contains("Secure"));
        assert!(!cookie.contains("Domain="));
    }

    #[test]
    fn cookie_lookup_ignores_other_and_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; ayurwell_session=abc; empty="),
        );
        assert_eq!(
            read_cookie_value(&headers, "ayurwell_session").as_deref(),
            Some("abc")
        );
        assert!(read_cookie_value(&headers, "empty").is_none());
        assert!(read_cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn request_origin_parses_origin_header_first() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://ayurwell.app/"));
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://evil.example/page"),
        );
        assert_eq!(
            request_origin_from_headers(&headers).as_deref(),
            Some("https://ayurwell.app")
        );
    }

    #[test]
    fn request_origin_falls_back_to_referer_origin() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("http://localhost:5173/prakriti-analysis?step=2"),
        );
        assert_eq!(
            request_origin_from_headers(&headers).as_deref(),
            Some("http://localhost:5173")
        );
    }

    #[test]
    fn only_health_and_questions_are_public() {
        assert!(is_public_endpoint("/health"));
        assert!(is_public_endpoint("/v1/prakriti/questions"));
        assert!(!is_public_endpoint("/v1/prakriti/submit"));
        assert!(!is_public_endpoint("/v1/admin/stats"));
    }

    #[test]
    fn session_tokens_are_urlsafe() {
        let token = generate_urlsafe_token(32);
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    }
}
