//! Unique identifier types for marketplace documents
//!
//! All IDs use UUID v7 so that ordering by id matches creation order. Message
//! history pagination relies on this: a message id doubles as its cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::{NoContext, Timestamp, Uuid};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new id stamped with the current time
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create an id whose time component is `at`
            pub fn at(at: DateTime<Utc>) -> Self {
                let ts = Timestamp::from_unix(
                    NoContext,
                    at.timestamp().max(0) as u64,
                    at.timestamp_subsec_nanos(),
                );
                Self(Uuid::new_v7(ts))
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Registered user (owner or advertiser)
    UserId
);
define_id!(
    /// Listed advertising space
    AdSpaceId
);
define_id!(
    /// Booking request raised by an advertiser
    RequestId
);
define_id!(
    /// Confirmed booking created from an approved request
    BookingId
);
define_id!(
    /// Two-party chat conversation
    ConversationId
);
define_id!(
    /// Single chat message
    MessageId
);
