//! Marketplace Engine
//!
//! Domain logic for the ad space marketplace: accounts, listings, the
//! request → approval → booking flow and two-party chat.
//!
//! **Key Invariants:**
//! - A request leaves `PENDING` exactly once
//! - Confirmed bookings on one listing never overlap
//! - Approving a request rejects every pending request it collides with
//! - A listing is `BOOKED` iff a confirmed booking covers the current day
//!   (unless its owner unlisted it)
//! - Only participants read or write a conversation

pub mod accounts;
pub mod bookings;
pub mod chat;
pub mod engine;
pub mod events;
pub mod listings;
pub mod password;
pub mod state;

#[cfg(test)]
mod testing;

pub use bookings::{Approval, SweepReport};
pub use engine::Marketplace;
pub use events::{EventPayload, MarketplaceEvent, Outcome};
pub use state::{MarketplaceState, StateStats};
