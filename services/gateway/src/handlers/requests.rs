use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{ApiPath, ApiQuery, OptionalJson};
use crate::models::{DecisionRequest, RequestListParams};
use crate::state::AppState;
use axum::{Json, extract::State};
use marketplace::Approval;
use types::booking::BookingRequest;
use types::ids::RequestId;
use types::pagination::Page;

pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<RequestListParams>,
) -> Result<Json<Page<BookingRequest>>, AppError> {
    let page = state
        .read(|market| {
            Ok(market.requests_for(user.user_id, &params.filter(), params.page_request()))
        })
        .await?;
    Ok(Json(page))
}

pub async fn get_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<Json<BookingRequest>, AppError> {
    let request = state.read(|market| market.request(user.user_id, id)).await?;
    Ok(Json(request))
}

pub async fn approve_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<RequestId>,
    OptionalJson(body): OptionalJson<DecisionRequest>,
) -> Result<Json<Approval>, AppError> {
    let approval = state
        .apply_listings(|market, clock| {
            market.approve_request(user.user_id, id, body.note, clock.today, clock.now)
        })
        .await?;
    Ok(Json(approval))
}

pub async fn reject_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<RequestId>,
    OptionalJson(body): OptionalJson<DecisionRequest>,
) -> Result<Json<BookingRequest>, AppError> {
    let request = state
        .apply(|market, clock| market.reject_request(user.user_id, id, body.note, clock.now))
        .await?;
    Ok(Json(request))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<Json<BookingRequest>, AppError> {
    let request = state
        .apply(|market, clock| market.cancel_request(user.user_id, id, clock.now))
        .await?;
    Ok(Json(request))
}
