//! Two-party chat: conversations, message history and read tracking

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;
use types::chat::{
    normalize_body, participant_key, Conversation, ConversationSummary, Message, MessagePreview,
};
use types::errors::{MarketError, MarketResult};
use types::ids::{AdSpaceId, ConversationId, MessageId, UserId};
use types::pagination::{CursorPage, Page, PageRequest, MAX_PAGE_LIMIT};

use crate::engine::Marketplace;
use crate::events::{EventPayload, MarketplaceEvent, Outcome};
use crate::state::ConversationKey;

pub const DEFAULT_HISTORY_LIMIT: usize = 30;

impl Marketplace {
    /// Find or create the conversation between `user` and `other`, optionally
    /// scoped to a listing one of them owns.
    pub fn open_conversation(
        &mut self,
        user: UserId,
        other: UserId,
        space_id: Option<AdSpaceId>,
        now: DateTime<Utc>,
    ) -> MarketResult<Conversation> {
        if user == other {
            return Err(MarketError::validation("cannot start a conversation with yourself"));
        }
        self.user_record(user)?;
        self.user_record(other)?;
        if let Some(space_id) = space_id {
            let space = self.space_record(space_id)?;
            if !space.is_owned_by(user) && !space.is_owned_by(other) {
                return Err(MarketError::validation(
                    "conversation listing must belong to one of the participants",
                ));
            }
        }

        let key = ConversationKey {
            participants: participant_key(user, other),
            space_id,
        };
        if let Some(id) = self.state.conversation_index.get(&key) {
            if let Some(existing) = self.state.conversations.get(id) {
                return Ok(existing.clone());
            }
        }

        let conversation = Conversation {
            id: ConversationId::at(now),
            participants: key.participants,
            space_id,
            last_message: None,
            created_at: now,
            updated_at: now,
        };
        debug!(conversation_id = %conversation.id, "conversation opened");
        self.state.conversation_index.insert(key, conversation.id);
        self.state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    pub fn conversation(&self, user: UserId, id: ConversationId) -> MarketResult<Conversation> {
        self.joined_conversation(user, id).cloned()
    }

    /// The user's conversations, most recent activity first
    pub fn conversations_for(&self, user: UserId, page: PageRequest) -> Page<ConversationSummary> {
        let mut conversations: Vec<&Conversation> = self
            .state
            .conversations
            .values()
            .filter(|c| c.has_participant(user))
            .collect();
        conversations.sort_by_key(|c| Reverse((c.updated_at, c.id)));
        page.paginate(conversations.into_iter().map(|c| ConversationSummary {
            conversation: c.clone(),
            unread_count: self.unread_in(c.id, user),
        }))
    }

    pub fn send_message(
        &mut self,
        user: UserId,
        conversation_id: ConversationId,
        body: &str,
        now: DateTime<Utc>,
    ) -> MarketResult<Outcome<Message>> {
        let participants = self.joined_conversation(user, conversation_id)?.participants;
        let body = normalize_body(body)?;

        let history = self.state.messages.entry(conversation_id).or_default();
        let mut id = MessageId::at(now);
        // Ids are the history order; step past the newest one if the clock stalled
        if let Some(last) = history.values().next_back() {
            let mut at = now.max(last.created_at);
            id = MessageId::at(at);
            while id <= last.id {
                at += chrono::Duration::milliseconds(1);
                id = MessageId::at(at);
            }
        }
        let message = Message {
            id,
            conversation_id,
            sender_id: user,
            body,
            created_at: now,
            read_at: None,
        };
        history.insert(message.id, message.clone());

        if let Some(conversation) = self.state.conversations.get_mut(&conversation_id) {
            conversation.last_message = Some(MessagePreview::from(&message));
            conversation.updated_at = now;
        }
        let event = MarketplaceEvent::new(
            participants,
            EventPayload::MessageCreated {
                message: message.clone(),
            },
        );
        Ok(Outcome::new(message, vec![event]))
    }

    /// Newest-first history page. Pass the returned cursor as `before` to
    /// continue with older messages.
    pub fn messages(
        &self,
        user: UserId,
        conversation_id: ConversationId,
        before: Option<MessageId>,
        limit: Option<usize>,
    ) -> MarketResult<CursorPage<Message, MessageId>> {
        self.joined_conversation(user, conversation_id)?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_PAGE_LIMIT);

        let Some(history) = self.state.messages.get(&conversation_id) else {
            return Ok(CursorPage {
                items: Vec::new(),
                next_cursor: None,
            });
        };
        let mut older: Box<dyn Iterator<Item = &Message>> = match before {
            Some(cursor) => Box::new(history.range(..cursor).rev().map(|(_, m)| m)),
            None => Box::new(history.values().rev()),
        };
        let items: Vec<Message> = older.by_ref().take(limit).cloned().collect();
        let next_cursor = if older.next().is_some() {
            items.last().map(|m| m.id)
        } else {
            None
        };
        Ok(CursorPage { items, next_cursor })
    }

    /// Mark everything the other participant sent as read
    pub fn mark_read(
        &mut self,
        user: UserId,
        conversation_id: ConversationId,
        now: DateTime<Utc>,
    ) -> MarketResult<Outcome<usize>> {
        let other = self.joined_conversation(user, conversation_id)?.other(user);
        let count = self
            .state
            .messages
            .get_mut(&conversation_id)
            .map(|history| mark_unread(history, user, now))
            .unwrap_or(0);
        if count == 0 {
            return Ok(Outcome::quiet(0));
        }
        let event = MarketplaceEvent::new(
            [other],
            EventPayload::MessagesRead {
                conversation_id,
                reader_id: user,
                count,
                read_at: now,
            },
        );
        Ok(Outcome::new(count, vec![event]))
    }

    /// Typing indicator for the other participant; nothing is stored
    pub fn typing(
        &self,
        user: UserId,
        conversation_id: ConversationId,
    ) -> MarketResult<MarketplaceEvent> {
        let other = self.joined_conversation(user, conversation_id)?.other(user);
        Ok(MarketplaceEvent::new(
            [other],
            EventPayload::Typing {
                conversation_id,
                user_id: user,
            },
        ))
    }

    pub fn unread_total(&self, user: UserId) -> usize {
        self.state
            .conversations
            .values()
            .filter(|c| c.has_participant(user))
            .map(|c| self.unread_in(c.id, user))
            .sum()
    }

    fn unread_in(&self, conversation_id: ConversationId, user: UserId) -> usize {
        self.state
            .messages
            .get(&conversation_id)
            .map(|history| history.values().filter(|m| m.is_unread_by(user)).count())
            .unwrap_or(0)
    }
}

fn mark_unread(
    history: &mut BTreeMap<MessageId, Message>,
    reader: UserId,
    now: DateTime<Utc>,
) -> usize {
    let mut count = 0;
    for message in history.values_mut().filter(|m| m.is_unread_by(reader)) {
        message.read_at = Some(now);
        count += 1;
    }
    count
}
