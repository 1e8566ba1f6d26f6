//! Events emitted by marketplace mutations
//!
//! Each event names the users it concerns; the gateway's realtime hub fans
//! it out to every open session of those users.

use chrono::{DateTime, Utc};
use serde::Serialize;
use types::booking::{Booking, BookingRequest};
use types::chat::Message;
use types::ids::{ConversationId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// New request waiting for the owner's decision
    RequestCreated { request: BookingRequest },
    /// Request approved, rejected or cancelled
    RequestUpdated { request: BookingRequest },
    BookingConfirmed { booking: Booking },
    /// Booking completed or cancelled
    BookingUpdated { booking: Booking },
    MessageCreated { message: Message },
    MessagesRead {
        conversation_id: ConversationId,
        reader_id: UserId,
        count: usize,
        read_at: DateTime<Utc>,
    },
    Typing {
        conversation_id: ConversationId,
        user_id: UserId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketplaceEvent {
    #[serde(skip)]
    pub recipients: Vec<UserId>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl MarketplaceEvent {
    pub fn new(recipients: impl IntoIterator<Item = UserId>, payload: EventPayload) -> Self {
        let mut recipients: Vec<UserId> = recipients.into_iter().collect();
        recipients.sort();
        recipients.dedup();
        Self {
            recipients,
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::RequestCreated { .. } => "request_created",
            EventPayload::RequestUpdated { .. } => "request_updated",
            EventPayload::BookingConfirmed { .. } => "booking_confirmed",
            EventPayload::BookingUpdated { .. } => "booking_updated",
            EventPayload::MessageCreated { .. } => "message_created",
            EventPayload::MessagesRead { .. } => "messages_read",
            EventPayload::Typing { .. } => "typing",
        }
    }
}

/// Result of a mutation together with the events it produced
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<MarketplaceEvent>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, events: Vec<MarketplaceEvent>) -> Self {
        Self { value, events }
    }

    pub fn quiet(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }
}
