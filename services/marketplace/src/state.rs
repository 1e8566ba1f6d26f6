//! Document collections held by the engine
//!
//! Uses `BTreeMap` throughout so that iteration, and therefore snapshot
//! bytes, are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::ad_space::AdSpace;
use types::booking::{Booking, BookingRequest};
use types::chat::{Conversation, Message};
use types::ids::{AdSpaceId, BookingId, ConversationId, MessageId, RequestId, UserId};
use types::user::User;

/// Lookup key for find-or-create of conversations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub participants: [UserId; 2],
    pub space_id: Option<AdSpaceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceState {
    pub users: BTreeMap<UserId, User>,
    /// Lowercased email → user
    pub emails: BTreeMap<String, UserId>,
    pub spaces: BTreeMap<AdSpaceId, AdSpace>,
    pub requests: BTreeMap<RequestId, BookingRequest>,
    pub bookings: BTreeMap<BookingId, Booking>,
    pub conversations: BTreeMap<ConversationId, Conversation>,
    pub conversation_index: BTreeMap<ConversationKey, ConversationId>,
    /// Per-conversation history ordered by message id
    pub messages: BTreeMap<ConversationId, BTreeMap<MessageId, Message>>,
}

/// Document counts, for logging and the health endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateStats {
    pub users: usize,
    pub spaces: usize,
    pub requests: usize,
    pub bookings: usize,
    pub conversations: usize,
    pub messages: usize,
}

impl MarketplaceState {
    pub fn stats(&self) -> StateStats {
        StateStats {
            users: self.users.len(),
            spaces: self.spaces.len(),
            requests: self.requests.len(),
            bookings: self.bookings.len(),
            conversations: self.conversations.len(),
            messages: self.messages.values().map(BTreeMap::len).sum(),
        }
    }
}
