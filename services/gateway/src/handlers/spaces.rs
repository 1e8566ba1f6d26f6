use crate::auth::{AuthenticatedUser, OptionalUser};
use crate::cache::SearchKey;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{PageParams, SearchParams};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use marketplace::Outcome;
use tracing::debug;
use types::ad_space::{AdSpace, Availability, NewSpace, SpaceUpdate};
use types::booking::{BookingRequest, NewRequest};
use types::ids::AdSpaceId;
use types::pagination::Page;
use types::user::Role;

pub async fn search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<Page<AdSpace>>, AppError> {
    let market = state.market.read().await;
    let key = SearchKey {
        generation: state.cache.generation(),
        query: params.query(),
        page: params.page_request(),
    };
    if let Some(hit) = state.cache.search(&key).await {
        debug!(generation = key.generation, "search cache hit");
        return Ok(Json((*hit).clone()));
    }
    let result = market.search_spaces(&key.query, key.page);
    drop(market);

    let page = state.cache.store_search(key, result).await;
    Ok(Json((*page).clone()))
}

pub async fn create_space(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(new_space): ApiJson<NewSpace>,
) -> Result<(StatusCode, Json<AdSpace>), AppError> {
    user.require_role(Role::Owner)?;
    let space = state
        .apply_listings(|market, clock| {
            market
                .create_space(user.user_id, new_space, clock.now)
                .map(Outcome::quiet)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(space)))
}

pub async fn my_spaces(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<AdSpace>>, AppError> {
    user.require_role(Role::Owner)?;
    let page = state
        .read(|market| Ok(market.spaces_by_owner(user.user_id, params.page_request())))
        .await?;
    Ok(Json(page))
}

pub async fn get_space(
    State(state): State<AppState>,
    viewer: OptionalUser,
    ApiPath(id): ApiPath<AdSpaceId>,
) -> Result<Json<AdSpace>, AppError> {
    let market = state.market.read().await;
    let generation = state.cache.generation();
    if let Some(hit) = state.cache.space(generation, id).await {
        return Ok(Json((*hit).clone()));
    }
    let space = market.space(viewer.user_id(), id)?;
    drop(market);

    if space.availability != Availability::Unlisted {
        state.cache.store_space(generation, space.clone()).await;
    }
    Ok(Json(space))
}

pub async fn update_space(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<AdSpaceId>,
    ApiJson(update): ApiJson<SpaceUpdate>,
) -> Result<Json<AdSpace>, AppError> {
    let space = state
        .apply_listings(|market, clock| {
            market
                .update_space(user.user_id, id, update, clock.today, clock.now)
                .map(Outcome::quiet)
        })
        .await?;
    Ok(Json(space))
}

pub async fn delete_space(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<AdSpaceId>,
) -> Result<StatusCode, AppError> {
    state
        .apply_listings(|market, clock| market.delete_space(user.user_id, id, clock.today, clock.now))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn request_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<AdSpaceId>,
    ApiJson(new_request): ApiJson<NewRequest>,
) -> Result<(StatusCode, Json<BookingRequest>), AppError> {
    user.require_role(Role::Advertiser)?;
    let request = state
        .apply(|market, clock| {
            market.request_booking(user.user_id, id, new_request, clock.today, clock.now)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}
