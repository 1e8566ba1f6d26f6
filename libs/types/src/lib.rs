//! Types library for the ad space marketplace
//!
//! Document definitions shared by the domain engine, the snapshot store and
//! the HTTP gateway.
//!
//! # Modules
//! - `ids`: Unique identifiers (UserId, AdSpaceId, RequestId, BookingId, ConversationId, MessageId)
//! - `user`: Accounts and roles
//! - `ad_space`: Listings, pricing, footfall, search filters
//! - `booking`: Booking requests, bookings, date ranges
//! - `chat`: Conversations and messages
//! - `pagination`: Offset and cursor pages
//! - `errors`: Error taxonomy

pub mod ad_space;
pub mod booking;
pub mod chat;
pub mod errors;
pub mod ids;
pub mod pagination;
pub mod user;

pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ad_space::*;
    pub use crate::booking::*;
    pub use crate::chat::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::pagination::*;
    pub use crate::user::*;
}
