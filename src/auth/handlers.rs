use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AccountPayload, AccountWithToken, LoginRequest},
        extractors::AuthUser,
        repo_types::Account,
        validation::FieldViolation,
    },
    config::CookieConfig,
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me))
        .route(
            "/auth/:account_id",
            get(get_account).put(update_account).delete(delete_account),
        )
}

fn parse_account_id(op: &'static str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation {
        op,
        violations: vec![FieldViolation {
            field: "account_id",
            message: "must be a UUID".into(),
        }],
    })
}

fn json_body<T>(op: &'static str, body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "rejected request body");
        AppError::Validation {
            op,
            violations: vec![FieldViolation {
                field: "body",
                message: e.body_text(),
            }],
        }
    })
}

/// Token subject must be the account being changed.
fn require_owner(op: &'static str, user: &AuthUser, id: Uuid) -> Result<(), AppError> {
    if user.0.id != id {
        warn!(subject = %user.0.id, account_id = %id, "token subject does not own account");
        return Err(AppError::Unauthorized { op });
    }
    Ok(())
}

fn token_cookie(cfg: &CookieConfig, token: &str) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        cfg.name, token, cfg.max_age_seconds
    );
    if cfg.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

fn with_token_cookie(state: &AppState, status: StatusCode, body: AccountWithToken) -> Response {
    let cookie = token_cookie(&state.config.cookie, &body.token);
    let mut res = (status, Json(body)).into_response();
    if let Some(cookie) = cookie {
        res.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    res
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<AccountPayload>, JsonRejection>,
) -> Result<Response, AppError> {
    let payload = json_body("account.register", payload)?;
    let created = state.accounts.register(payload).await?;
    Ok(with_token_cookie(&state, StatusCode::CREATED, created))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let payload = json_body("account.login", payload)?;
    let session = state.accounts.login(payload).await?;
    Ok(with_token_cookie(&state, StatusCode::OK, session))
}

#[instrument(skip_all, fields(account_id = %user.0.id))]
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> Result<Json<Account>, AppError> {
    Ok(Json(state.accounts.get_by_id(user.0.id).await?))
}

#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<Account>, AppError> {
    let id = parse_account_id("account.get_by_id", &account_id)?;
    Ok(Json(state.accounts.get_by_id(id).await?))
}

#[instrument(skip(state, user, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    user: AuthUser,
    Path(account_id): Path<String>,
    payload: Result<Json<AccountPayload>, JsonRejection>,
) -> Result<Json<Account>, AppError> {
    const OP: &str = "account.update";
    let id = parse_account_id(OP, &account_id)?;
    require_owner(OP, &user, id)?;
    let payload = json_body(OP, payload)?;
    Ok(Json(state.accounts.update(id, payload).await?))
}

#[instrument(skip(state, user))]
pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
    Path(account_id): Path<String>,
) -> Result<Json<HashMap<String, &'static str>>, AppError> {
    const OP: &str = "account.delete";
    let id = parse_account_id(OP, &account_id)?;
    require_owner(OP, &user, id)?;
    state.accounts.delete(id).await?;
    Ok(Json(HashMap::from([(id.to_string(), "Deleted")])))
}
