use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::handlers::conversations::{mark_conversation_read, relay_typing, send_message};
use crate::hub::{ClientFrame, ServerFrame, SessionHandle};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, AppError> {
    state
        .rate_limiter
        .check(&format!("ws_connect:{}", user.user_id), state.limits.ws_connect)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: AuthenticatedUser) {
    let (mut sink, mut stream) = socket.split();
    let (session, mut frames) = state.hub.connect(user.user_id);
    info!(user_id = %user.user_id, session_id = %session.id, "websocket connected");

    let unread = state.market.read().await.unread_total(user.user_id);
    session.reply(ServerFrame::Connected {
        user_id: user.user_id,
        session_id: session.id,
        unread,
    });

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let reader_state = state.clone();
    let reader_session = session.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => {
                    if let Some(reply) =
                        handle_frame(&reader_state, &reader_session, text.as_str()).await
                    {
                        reader_session.reply(reply);
                    }
                }
                Message::Close(_) => break,
                // Pings are answered by axum
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    state.hub.disconnect(user.user_id, session.id);
    info!(user_id = %user.user_id, session_id = %session.id, "websocket closed");
}

/// Apply one client frame; the return value is sent back to this session only
async fn handle_frame(state: &AppState, session: &SessionHandle, text: &str) -> Option<ServerFrame> {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "unparseable client frame");
            return Some(ServerFrame::Error {
                code: "BAD_REQUEST",
                message: format!("Invalid frame: {}", e),
            });
        }
    };

    let user_id = session.user_id;
    let result = match frame {
        ClientFrame::Ping => return Some(ServerFrame::Pong),
        // The sender receives its own message back through the hub
        ClientFrame::Send {
            conversation_id,
            body,
        } => send_message(state, user_id, conversation_id, &body)
            .await
            .map(|_| ()),
        ClientFrame::Typing { conversation_id } => {
            relay_typing(state, user_id, conversation_id).await
        }
        ClientFrame::Read { conversation_id } => {
            mark_conversation_read(state, user_id, conversation_id)
                .await
                .map(|_| ())
        }
    };

    result.err().map(|e| ServerFrame::Error {
        code: e.code(),
        message: e.message(),
    })
}
