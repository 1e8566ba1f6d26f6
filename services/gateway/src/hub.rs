//! Realtime fan-out of marketplace events to websocket sessions
//!
//! A user may hold several sessions (tabs, devices). Every event is delivered
//! to all sessions of each recipient. Delivery never blocks the caller: a
//! session whose buffer is full misses the frame.

use dashmap::DashMap;
use marketplace::MarketplaceEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use types::ids::{ConversationId, UserId};
use uuid::Uuid;

/// Frames buffered per session before new ones are dropped
pub const SESSION_BUFFER: usize = 64;

/// Frame pushed to the client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Connected {
        user_id: UserId,
        session_id: Uuid,
        unread: usize,
    },
    Event {
        event: MarketplaceEvent,
    },
    Pong,
    Error {
        code: &'static str,
        message: String,
    },
}

/// Frame sent by the client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Send {
        conversation_id: ConversationId,
        body: String,
    },
    Typing {
        conversation_id: ConversationId,
    },
    Read {
        conversation_id: ConversationId,
    },
    Ping,
}

struct Session {
    id: Uuid,
    tx: mpsc::Sender<ServerFrame>,
}

/// One registered connection
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub user_id: UserId,
    pub tx: mpsc::Sender<ServerFrame>,
}

impl SessionHandle {
    /// Queue a frame for this session only
    pub fn reply(&self, frame: ServerFrame) -> bool {
        self.tx.try_send(frame).is_ok()
    }
}

#[derive(Default)]
pub struct Hub {
    sessions: DashMap<UserId, Vec<Session>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, user_id: UserId) -> (SessionHandle, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let id = Uuid::now_v7();
        self.sessions.entry(user_id).or_default().push(Session {
            id,
            tx: tx.clone(),
        });
        debug!(%user_id, session_id = %id, "session connected");
        (SessionHandle { id, user_id, tx }, rx)
    }

    pub fn disconnect(&self, user_id: UserId, session_id: Uuid) {
        if let Some(mut sessions) = self.sessions.get_mut(&user_id) {
            sessions.retain(|s| s.id != session_id);
        }
        self.sessions.remove_if(&user_id, |_, sessions| sessions.is_empty());
        debug!(%user_id, %session_id, "session disconnected");
    }

    /// Deliver to every session of every recipient; returns frames queued
    pub fn publish(&self, event: &MarketplaceEvent) -> usize {
        let mut delivered = 0;
        for user_id in &event.recipients {
            let Some(mut sessions) = self.sessions.get_mut(user_id) else {
                continue;
            };
            sessions.retain(|session| {
                match session.tx.try_send(ServerFrame::Event {
                    event: event.clone(),
                }) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(TrySendError::Full(_)) => {
                        warn!(%user_id, session_id = %session.id, kind = event.kind(), "session lagging, frame dropped");
                        true
                    }
                    Err(TrySendError::Closed(_)) => false,
                }
            });
        }
        delivered
    }

    pub fn publish_all(&self, events: &[MarketplaceEvent]) -> usize {
        events.iter().map(|event| self.publish(event)).sum()
    }

    /// Online means at least one open session
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.sessions
            .get(&user_id)
            .map(|sessions| !sessions.is_empty())
            .unwrap_or(false)
    }

    pub fn online_users(&self) -> usize {
        self.sessions.iter().filter(|e| !e.value().is_empty()).count()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.iter().map(|e| e.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace::EventPayload;

    fn typing_event(recipients: Vec<UserId>) -> MarketplaceEvent {
        MarketplaceEvent::new(
            recipients,
            EventPayload::Typing {
                conversation_id: ConversationId::new(),
                user_id: UserId::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_event_reaches_every_session() {
        let hub = Hub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (_a1, mut rx1) = hub.connect(alice);
        let (_a2, mut rx2) = hub.connect(alice);
        let (_b, mut rx_bob) = hub.connect(bob);

        let delivered = hub.publish(&typing_event(vec![alice]));
        assert_eq!(delivered, 2);
        assert!(matches!(rx1.recv().await, Some(ServerFrame::Event { .. })));
        assert!(matches!(rx2.recv().await, Some(ServerFrame::Event { .. })));
        assert!(rx_bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_presence_follows_sessions() {
        let hub = Hub::new();
        let alice = UserId::new();
        assert!(!hub.is_online(alice));

        let (first, _rx1) = hub.connect(alice);
        let (second, _rx2) = hub.connect(alice);
        assert!(hub.is_online(alice));
        assert_eq!(hub.session_count(), 2);

        hub.disconnect(alice, first.id);
        assert!(hub.is_online(alice));
        hub.disconnect(alice, second.id);
        assert!(!hub.is_online(alice));
        assert_eq!(hub.online_users(), 0);
    }

    #[tokio::test]
    async fn test_closed_sessions_are_dropped() {
        let hub = Hub::new();
        let alice = UserId::new();
        let (_handle, rx) = hub.connect(alice);
        drop(rx);
        assert_eq!(hub.publish(&typing_event(vec![alice])), 0);
        assert_eq!(hub.session_count(), 0);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_frames_but_keeps_session() {
        let hub = Hub::new();
        let alice = UserId::new();
        let (_handle, _rx) = hub.connect(alice);
        let event = typing_event(vec![alice]);
        for _ in 0..SESSION_BUFFER {
            assert_eq!(hub.publish(&event), 1);
        }
        assert_eq!(hub.publish(&event), 0);
        assert!(hub.is_online(alice));
    }

    #[test]
    fn test_client_frame_parsing() {
        let id = ConversationId::new();
        let frame: ClientFrame = serde_json::from_str(&format!(
            r#"{{"type":"send","conversation_id":"{}","body":"hello"}}"#,
            id
        ))
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Send {
                conversation_id: id,
                body: "hello".to_string()
            }
        );
        let ping: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientFrame::Ping);
    }

    #[test]
    fn test_server_frame_shape() {
        let json = serde_json::to_value(ServerFrame::Event {
            event: typing_event(vec![UserId::new()]),
        })
        .unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["kind"], "typing");
        assert!(json["event"].get("recipients").is_none());
    }
}
