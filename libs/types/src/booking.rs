//! Booking request and booking lifecycle types
//!
//! Request states:
//! ```text
//! PENDING ──approve──▶ APPROVED   (creates a Booking)
//!    │ ────reject───▶ REJECTED
//!    └─────cancel───▶ CANCELLED
//! ```
//! Booking states: `CONFIRMED → COMPLETED | CANCELLED`.

use crate::errors::{MarketError, MarketResult};
use crate::ids::{AdSpaceId, BookingId, RequestId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest bookable span, in days
pub const MAX_BOOKING_DAYS: u32 = 366;

pub const MAX_REQUEST_MESSAGE_LEN: usize = 1000;

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> MarketResult<Self> {
        if start > end {
            return Err(MarketError::validation("start_date must not be after end_date"));
        }
        Ok(Self { start, end })
    }

    /// Number of days covered, counting both ends
    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (
                RequestStatus::Pending,
                RequestStatus::Approved | RequestStatus::Rejected | RequestStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: RequestId,
    pub space_id: AdSpaceId,
    pub owner_id: UserId,
    pub advertiser_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl BookingRequest {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.owner_id == user || self.advertiser_id == user
    }

    /// Move to `next`, stamping the decision time
    pub fn transition(
        &mut self,
        next: RequestStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> MarketResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(MarketError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.decision_note = note;
        self.updated_at = now;
        self.decided_at = Some(now);
        Ok(())
    }
}

/// Booking request payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub message: Option<String>,
}

/// Filter for request listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub space_id: Option<AdSpaceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Completed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub request_id: RequestId,
    pub space_id: AdSpaceId,
    pub owner_id: UserId,
    pub advertiser_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: Decimal,
    pub currency: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.owner_id == user || self.advertiser_id == user
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    /// Confirmed and running on `day`
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.is_confirmed() && self.range().contains(day)
    }
}
