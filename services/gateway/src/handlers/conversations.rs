use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{
    ConversationList, HistoryParams, OpenConversationRequest, PageParams, ReadReceipt,
    SendMessageRequest,
};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use marketplace::Outcome;
use types::chat::{Conversation, Message};
use types::ids::{ConversationId, MessageId, UserId};
use types::pagination::CursorPage;

pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<ConversationList>, AppError> {
    let list = state
        .read(|market| {
            Ok(ConversationList {
                page: market.conversations_for(user.user_id, params.page_request()),
                unread_total: market.unread_total(user.user_id),
            })
        })
        .await?;
    Ok(Json(list))
}

pub async fn open_conversation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<OpenConversationRequest>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = state
        .apply(|market, clock| {
            market
                .open_conversation(user.user_id, body.participant_id, body.space_id, clock.now)
                .map(Outcome::quiet)
        })
        .await?;
    Ok(Json(conversation))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = state
        .read(|market| market.conversation(user.user_id, id))
        .await?;
    Ok(Json(conversation))
}

pub async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<ConversationId>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<Json<CursorPage<Message, MessageId>>, AppError> {
    let page = state
        .read(|market| market.messages(user.user_id, id, params.before, params.limit))
        .await?;
    Ok(Json(page))
}

pub async fn send(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = send_message(&state, user.user_id, id, &body.body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<ReadReceipt>, AppError> {
    let marked = mark_conversation_read(&state, user.user_id, id).await?;
    Ok(Json(ReadReceipt { marked }))
}

// Shared by the HTTP routes and the websocket session

pub(crate) async fn send_message(
    state: &AppState,
    user_id: UserId,
    conversation_id: ConversationId,
    body: &str,
) -> Result<Message, AppError> {
    state
        .rate_limiter
        .check(&format!("message:{}", user_id), state.limits.message)?;
    state
        .apply(|market, clock| market.send_message(user_id, conversation_id, body, clock.now))
        .await
}

pub(crate) async fn mark_conversation_read(
    state: &AppState,
    user_id: UserId,
    conversation_id: ConversationId,
) -> Result<usize, AppError> {
    state
        .apply(|market, clock| market.mark_read(user_id, conversation_id, clock.now))
        .await
}

/// Typing indicators are relayed, never stored
pub(crate) async fn relay_typing(
    state: &AppState,
    user_id: UserId,
    conversation_id: ConversationId,
) -> Result<(), AppError> {
    let event = state
        .read(|market| market.typing(user_id, conversation_id))
        .await?;
    state.hub.publish(&event);
    Ok(())
}
