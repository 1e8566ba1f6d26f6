use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::UserProfile;
use crate::state::AppState;
use axum::{Json, extract::State};
use marketplace::Outcome;
use types::ids::UserId;
use types::user::{ProfileUpdate, PublicUser};

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<PublicUser>, AppError> {
    let me = state.read(|market| market.user(user.user_id)).await?;
    Ok(Json(me))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<PublicUser>, AppError> {
    let updated = state
        .apply(|market, clock| {
            market
                .update_profile(user.user_id, update, clock.now)
                .map(Outcome::quiet)
        })
        .await?;
    Ok(Json(updated))
}

pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<UserProfile>, AppError> {
    let user = state.read(|market| market.user(id)).await?;
    Ok(Json(UserProfile {
        online: state.hub.is_online(id),
        user,
    }))
}
