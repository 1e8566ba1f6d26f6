use crate::error::AppError;
use crate::extract::ApiJson;
use crate::models::{AuthResponse, LoginRequest};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use marketplace::Outcome;
use tracing::{info, warn};
use types::user::{NewUser, PublicUser};

fn login_key(email: &str) -> String {
    email.trim().to_lowercase()
}

fn respond(state: &AppState, user: PublicUser) -> Result<AuthResponse, AppError> {
    let issued = state.tokens.issue(&user, Utc::now())?;
    Ok(AuthResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_at: issued.expires_at,
        user,
    })
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(new_user): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    state.rate_limiter.check(
        &format!("register:{}", login_key(&new_user.email)),
        state.limits.register,
    )?;

    let user = state
        .apply(|market, clock| market.register(new_user, clock.now).map(Outcome::quiet))
        .await?;
    Ok((StatusCode::CREATED, Json(respond(&state, user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let key = login_key(&body.email);
    state
        .rate_limiter
        .check(&format!("login:{}", key), state.limits.login)?;

    let user = state
        .read(|market| market.authenticate(&body.email, &body.password))
        .await
        .inspect_err(|_| warn!(email = %key, "login failed"))?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(respond(&state, user)?))
}
