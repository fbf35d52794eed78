use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::auth::{
    hash_password, issue_token, session_expiry, verify_password, AuthError, Role,
};
use crate::config::Config;
use crate::eligibility::evaluator::evaluate;
use crate::eligibility::EligibilityResult;
use crate::intake::{validate_submission, ApplicationSubmission};
use crate::storage::{NewApplication, PortalStore, StoredApplication, StoredUser};

#[derive(Clone)]
struct ApiState {
    config: Config,
    db_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    full_name: String,
    email: String,
    password: String,
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    id: i64,
    full_name: String,
    email: String,
    role: Role,
    token: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    message: String,
    /// What the failed track would have required; absent on PASS.
    requirements: Option<&'static str>,
    application: StoredApplication,
}

#[derive(Debug, Serialize)]
struct PrecheckResponse {
    eligibility: EligibilityResult,
    requirements: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ApplicationsResponse {
    count: usize,
    applications: Vec<StoredApplication>,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let origin = config
        .server
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("invalid allowed_origin: {e}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let state = ApiState {
        db_path: config.resolved_db_path(),
        config,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/profile", get(profile))
        .route("/api/applications", post(submit_application).get(all_applications))
        .route("/api/applications/precheck", post(precheck))
        .route("/api/applications/:id", get(get_application))
        .route("/api/applications/user/:user_id", get(user_applications))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("admission portal API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn register(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    if request.password.len() < 6 {
        return Err(ApiError::bad_request(AuthError::WeakPassword.to_string()));
    }
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(ApiError::bad_request("full name is required"));
    }
    let email = request.email.trim().to_ascii_lowercase();
    if !email.contains('@') {
        return Err(ApiError::bad_request("please enter a valid email address"));
    }
    let role = match request.role.as_deref() {
        None => Role::Applicant,
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
    };

    let store = open_store(&state)?;
    if store
        .find_user_by_email(&email)
        .map_err(ApiError::internal)?
        .is_some()
    {
        return Err(ApiError::bad_request(AuthError::DuplicateEmail.to_string()));
    }

    let user = store
        .insert_user(full_name, &email, &hash_password(&request.password), role)
        .map_err(ApiError::internal)?;
    let token = start_session(&state, &store, &user)?;
    info!(user = user.id, "registered new {role} account");

    Ok(ok(AuthResponse {
        id: user.id,
        full_name: user.full_name,
        email: user.email,
        role: user.role,
        token,
    }))
}

async fn login(
    State(state): State<ApiState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let store = open_store(&state)?;
    let email = request.email.trim().to_ascii_lowercase();
    let user = store
        .find_user_by_email(&email)
        .map_err(ApiError::internal)?
        .filter(|user| verify_password(&request.password, &user.password_hash))
        .ok_or_else(|| ApiError::unauthorized(AuthError::InvalidCredentials.to_string()))?;

    let token = start_session(&state, &store, &user)?;
    Ok(ok(AuthResponse {
        id: user.id,
        full_name: user.full_name,
        email: user.email,
        role: user.role,
        token,
    }))
}

async fn profile(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<StoredUser> {
    let store = open_store(&state)?;
    let user = authed_user(&store, &headers)?;
    Ok(ok(user))
}

async fn submit_application(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(submission): Json<ApplicationSubmission>,
) -> std::result::Result<Response, ApiError> {
    let store = open_store(&state)?;
    let applicant = maybe_authed_user(&store, &headers)?;
    if applicant.is_none() && !state.config.auth.allow_public_submissions {
        return Err(ApiError::unauthorized("sign in to submit an application"));
    }

    let validated =
        validate_submission(&submission).map_err(|e| ApiError::bad_request(e.to_string()))?;
    // An invalid record is a hard rejection of the submission, never a
    // soft FAIL, and nothing is persisted for it.
    let result = evaluate(&validated.record).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let stored = store
        .insert_application(&NewApplication {
            applicant_id: applicant.as_ref().map(|user| user.id),
            profile: validated.profile,
            record: validated.record,
            result,
        })
        .map_err(ApiError::internal)?;
    info!(
        application = stored.id,
        track = %stored.record.track(),
        verdict = %stored.result.verdict,
        "application submitted"
    );

    let passed = stored.result.passed();
    let track = stored.record.track();
    let body = Json(ApiResponse {
        ok: passed,
        data: SubmitResponse {
            message: if passed {
                "application submitted successfully".to_string()
            } else {
                "eligibility criteria not met".to_string()
            },
            requirements: (!passed).then(|| track.requirement()),
            application: stored,
        },
    });
    let status = if passed {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, body).into_response())
}

/// Scores a submission without persisting anything, so the client can show
/// feedback before the authoritative submit. Same validation, same
/// evaluator, numerically identical outcome.
async fn precheck(
    Json(submission): Json<ApplicationSubmission>,
) -> ApiResult<PrecheckResponse> {
    let validated =
        validate_submission(&submission).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let eligibility =
        evaluate(&validated.record).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let requirements = (!eligibility.passed()).then(|| validated.record.track().requirement());
    Ok(ok(PrecheckResponse {
        eligibility,
        requirements,
    }))
}

async fn get_application(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<StoredApplication> {
    let store = open_store(&state)?;
    let user = authed_user(&store, &headers)?;
    let application = store
        .load_application(id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("application not found"))?;
    if !can_view(&user, application.applicant_id) {
        return Err(ApiError::forbidden("not authorized to view this application"));
    }
    Ok(ok(application))
}

async fn user_applications(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<ApplicationsResponse> {
    let store = open_store(&state)?;
    let user = authed_user(&store, &headers)?;
    if !can_view(&user, Some(user_id)) {
        return Err(ApiError::forbidden(
            "not authorized to view these applications",
        ));
    }
    let applications = store
        .applications_for_user(user_id)
        .map_err(ApiError::internal)?;
    Ok(ok(ApplicationsResponse {
        count: applications.len(),
        applications,
    }))
}

async fn all_applications(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<ApplicationsResponse> {
    let store = open_store(&state)?;
    let user = authed_user(&store, &headers)?;
    if user.role != Role::Admin {
        return Err(ApiError::forbidden("admin access required"));
    }
    let applications = store.all_applications().map_err(ApiError::internal)?;
    Ok(ok(ApplicationsResponse {
        count: applications.len(),
        applications,
    }))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn open_store(state: &ApiState) -> std::result::Result<PortalStore, ApiError> {
    PortalStore::open(&state.db_path).map_err(ApiError::internal)
}

fn start_session(
    state: &ApiState,
    store: &PortalStore,
    user: &StoredUser,
) -> std::result::Result<String, ApiError> {
    let token = issue_token();
    store
        .insert_session(&token, user.id, session_expiry(state.config.auth.token_ttl_days))
        .map_err(ApiError::internal)?;
    Ok(token)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn authed_user(
    store: &PortalStore,
    headers: &HeaderMap,
) -> std::result::Result<StoredUser, ApiError> {
    maybe_authed_user(store, headers)?
        .ok_or_else(|| ApiError::unauthorized(AuthError::InvalidToken.to_string()))
}

fn maybe_authed_user(
    store: &PortalStore,
    headers: &HeaderMap,
) -> std::result::Result<Option<StoredUser>, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    let user = store
        .session_user(token)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::unauthorized(AuthError::InvalidToken.to_string()))?;
    Ok(Some(user))
}

fn can_view(user: &StoredUser, applicant_id: Option<i64>) -> bool {
    user.role == Role::Admin || applicant_id == Some(user.id)
}

#[cfg(test)]
mod tests {
    use super::{bearer_token, can_view};
    use crate::auth::Role;
    use crate::storage::StoredUser;
    use axum::http::{HeaderMap, HeaderValue};
    use chrono::Utc;

    fn user(id: i64, role: Role) -> StoredUser {
        StoredUser {
            id,
            full_name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "salt$digest".to_string(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn owners_and_admins_can_view() {
        assert!(can_view(&user(7, Role::Applicant), Some(7)));
        assert!(!can_view(&user(7, Role::Applicant), Some(8)));
        assert!(!can_view(&user(7, Role::Applicant), None));
        assert!(can_view(&user(1, Role::Admin), Some(8)));
        assert!(can_view(&user(1, Role::Admin), None));
    }
}
