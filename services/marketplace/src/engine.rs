//! Marketplace engine core
//!
//! Owns every document and applies all mutations. The engine is a plain
//! single-writer value: callers serialize access (the gateway keeps it behind
//! an async `RwLock`), and every operation takes the current time explicitly
//! so that behavior is reproducible in tests.

use crate::state::{MarketplaceState, StateStats};
use types::ad_space::AdSpace;
use types::booking::{Booking, BookingRequest};
use types::chat::Conversation;
use types::errors::{MarketError, MarketResult};
use types::ids::{AdSpaceId, BookingId, ConversationId, RequestId, UserId};
use types::user::{Role, User};

#[derive(Debug, Default)]
pub struct Marketplace {
    pub(crate) state: MarketplaceState,
}

impl Marketplace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously persisted documents
    pub fn from_state(state: MarketplaceState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &MarketplaceState {
        &self.state
    }

    pub fn stats(&self) -> StateStats {
        self.state.stats()
    }

    pub(crate) fn user_record(&self, id: UserId) -> MarketResult<&User> {
        self.state
            .users
            .get(&id)
            .ok_or_else(|| MarketError::not_found("User", id))
    }

    pub(crate) fn require_role(&self, id: UserId, role: Role) -> MarketResult<&User> {
        let user = self.user_record(id)?;
        if user.role != role {
            return Err(MarketError::forbidden(format!(
                "only {} accounts may do this",
                role
            )));
        }
        Ok(user)
    }

    pub(crate) fn space_record(&self, id: AdSpaceId) -> MarketResult<&AdSpace> {
        self.state
            .spaces
            .get(&id)
            .ok_or_else(|| MarketError::not_found("Ad space", id))
    }

    pub(crate) fn owned_space_mut(
        &mut self,
        owner: UserId,
        id: AdSpaceId,
    ) -> MarketResult<&mut AdSpace> {
        let space = self
            .state
            .spaces
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("Ad space", id))?;
        if !space.is_owned_by(owner) {
            return Err(MarketError::forbidden("not the owner of this ad space"));
        }
        Ok(space)
    }

    pub(crate) fn request_record(&self, id: RequestId) -> MarketResult<&BookingRequest> {
        self.state
            .requests
            .get(&id)
            .ok_or_else(|| MarketError::not_found("Booking request", id))
    }

    pub(crate) fn booking_record(&self, id: BookingId) -> MarketResult<&Booking> {
        self.state
            .bookings
            .get(&id)
            .ok_or_else(|| MarketError::not_found("Booking", id))
    }

    /// Conversation the user takes part in
    pub(crate) fn joined_conversation(
        &self,
        user: UserId,
        id: ConversationId,
    ) -> MarketResult<&Conversation> {
        let conversation = self
            .state
            .conversations
            .get(&id)
            .ok_or_else(|| MarketError::not_found("Conversation", id))?;
        if !conversation.has_participant(user) {
            return Err(MarketError::forbidden("not a participant of this conversation"));
        }
        Ok(conversation)
    }
}
