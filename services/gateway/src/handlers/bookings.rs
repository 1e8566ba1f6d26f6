use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{ApiPath, ApiQuery};
use crate::models::BookingListParams;
use crate::state::AppState;
use axum::{Json, extract::State};
use types::booking::Booking;
use types::ids::BookingId;
use types::pagination::Page;

pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<BookingListParams>,
) -> Result<Json<Page<Booking>>, AppError> {
    let page = state
        .read(|market| {
            Ok(market.bookings_for(user.user_id, params.status, params.page_request()))
        })
        .await?;
    Ok(Json(page))
}

pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.read(|market| market.booking(user.user_id, id)).await?;
    Ok(Json(booking))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .apply_listings(|market, clock| {
            market.cancel_booking(user.user_id, id, clock.today, clock.now)
        })
        .await?;
    Ok(Json(booking))
}
