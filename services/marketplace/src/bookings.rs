//! Booking flow: request → approval → booking
//!
//! An advertiser raises a request for a date range on a listing. The owner
//! approves or rejects it; approval creates a confirmed booking, priced from
//! the listing's pricing, and rejects every other pending request whose
//! dates collide with it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use tracing::{debug, info, warn};
use types::booking::{
    Booking, BookingRequest, BookingStatus, DateRange, NewRequest, RequestFilter, RequestStatus,
    MAX_BOOKING_DAYS, MAX_REQUEST_MESSAGE_LEN,
};
use types::errors::{MarketError, MarketResult};
use types::ids::{AdSpaceId, BookingId, RequestId, UserId};
use types::pagination::{Page, PageRequest};
use types::user::Role;

use crate::engine::Marketplace;
use crate::events::{EventPayload, MarketplaceEvent, Outcome};

const DATES_TAKEN_NOTE: &str = "dates no longer available";
const EXPIRED_NOTE: &str = "request expired";

/// Approved request and the booking it produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Approval {
    pub request: BookingRequest,
    pub booking: Booking,
}

/// Result of a periodic sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub completed_bookings: usize,
    pub expired_requests: usize,
    pub spaces_updated: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Marketplace {
    pub fn request_booking(
        &mut self,
        advertiser: UserId,
        space_id: AdSpaceId,
        new: NewRequest,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> MarketResult<Outcome<BookingRequest>> {
        self.require_role(advertiser, Role::Advertiser)?;
        let space = self.space_record(space_id)?;
        if space.is_owned_by(advertiser) {
            return Err(MarketError::forbidden("cannot book your own ad space"));
        }
        if !space.accepts_requests() {
            return Err(MarketError::not_found("Ad space", space_id));
        }
        let owner_id = space.owner_id;

        let range = DateRange::new(new.start_date, new.end_date)?;
        if range.start < today {
            return Err(MarketError::validation("start_date is in the past"));
        }
        if range.days() > MAX_BOOKING_DAYS {
            return Err(MarketError::validation(format!(
                "bookings are limited to {} days",
                MAX_BOOKING_DAYS
            )));
        }
        let message = new
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if message
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_REQUEST_MESSAGE_LEN)
        {
            return Err(MarketError::validation(format!(
                "message exceeds {} characters",
                MAX_REQUEST_MESSAGE_LEN
            )));
        }

        self.ensure_dates_free(space_id, &range)?;
        let duplicate = self.state.requests.values().any(|r| {
            r.space_id == space_id
                && r.advertiser_id == advertiser
                && r.status == RequestStatus::Pending
                && r.range().overlaps(&range)
        });
        if duplicate {
            return Err(MarketError::conflict(
                "you already have a pending request for these dates",
            ));
        }

        let request = BookingRequest {
            id: RequestId::at(now),
            space_id,
            owner_id,
            advertiser_id: advertiser,
            start_date: range.start,
            end_date: range.end,
            message,
            status: RequestStatus::Pending,
            decision_note: None,
            created_at: now,
            updated_at: now,
            decided_at: None,
        };
        info!(request_id = %request.id, space_id = %space_id, "booking requested");
        self.state.requests.insert(request.id, request.clone());
        let event = MarketplaceEvent::new(
            [owner_id],
            EventPayload::RequestCreated {
                request: request.clone(),
            },
        );
        Ok(Outcome::new(request, vec![event]))
    }

    pub fn approve_request(
        &mut self,
        owner: UserId,
        request_id: RequestId,
        note: Option<String>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> MarketResult<Outcome<Approval>> {
        let request = self.owned_request(owner, request_id)?;
        ensure_pending(request, RequestStatus::Approved)?;
        if request.start_date < today {
            return Err(MarketError::conflict("request dates have already started"));
        }
        let range = request.range();
        let space_id = request.space_id;
        let advertiser = request.advertiser_id;
        self.ensure_dates_free(space_id, &range)?;

        let space = self.space_record(space_id)?;
        let booking = Booking {
            id: BookingId::at(now),
            request_id,
            space_id,
            owner_id: owner,
            advertiser_id: advertiser,
            start_date: range.start,
            end_date: range.end,
            total_price: space.pricing.quote(range.days()),
            currency: space.pricing.currency.clone(),
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };

        let mut events = Vec::new();
        let request = self.transition_request(request_id, RequestStatus::Approved, note, now)?;
        events.push(MarketplaceEvent::new(
            [advertiser],
            EventPayload::RequestUpdated {
                request: request.clone(),
            },
        ));

        let colliding: Vec<RequestId> = self
            .state
            .requests
            .values()
            .filter(|r| {
                r.space_id == space_id
                    && r.status == RequestStatus::Pending
                    && r.range().overlaps(&range)
            })
            .map(|r| r.id)
            .collect();
        for id in colliding {
            let rejected = self.transition_request(
                id,
                RequestStatus::Rejected,
                Some(DATES_TAKEN_NOTE.to_string()),
                now,
            )?;
            debug!(request_id = %id, "auto-rejected overlapping request");
            events.push(MarketplaceEvent::new(
                [rejected.advertiser_id],
                EventPayload::RequestUpdated { request: rejected },
            ));
        }

        self.state.bookings.insert(booking.id, booking.clone());
        self.refresh_availability(space_id, today, now);
        events.push(MarketplaceEvent::new(
            [owner, advertiser],
            EventPayload::BookingConfirmed {
                booking: booking.clone(),
            },
        ));
        info!(
            request_id = %request_id,
            booking_id = %booking.id,
            total = %booking.total_price,
            "booking confirmed"
        );
        Ok(Outcome::new(Approval { request, booking }, events))
    }

    pub fn reject_request(
        &mut self,
        owner: UserId,
        request_id: RequestId,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> MarketResult<Outcome<BookingRequest>> {
        let request = self.owned_request(owner, request_id)?;
        ensure_pending(request, RequestStatus::Rejected)?;
        let request = self.transition_request(request_id, RequestStatus::Rejected, note, now)?;
        info!(request_id = %request_id, "booking request rejected");
        let event = MarketplaceEvent::new(
            [request.advertiser_id],
            EventPayload::RequestUpdated {
                request: request.clone(),
            },
        );
        Ok(Outcome::new(request, vec![event]))
    }

    pub fn cancel_request(
        &mut self,
        advertiser: UserId,
        request_id: RequestId,
        now: DateTime<Utc>,
    ) -> MarketResult<Outcome<BookingRequest>> {
        let request = self.request_record(request_id)?;
        if request.advertiser_id != advertiser {
            return Err(MarketError::forbidden("only the requester may cancel"));
        }
        ensure_pending(request, RequestStatus::Cancelled)?;
        let request = self.transition_request(request_id, RequestStatus::Cancelled, None, now)?;
        let event = MarketplaceEvent::new(
            [request.owner_id],
            EventPayload::RequestUpdated {
                request: request.clone(),
            },
        );
        Ok(Outcome::new(request, vec![event]))
    }

    pub fn request(&self, user: UserId, request_id: RequestId) -> MarketResult<BookingRequest> {
        let request = self.request_record(request_id)?;
        if !request.involves(user) {
            return Err(MarketError::forbidden("not a party to this request"));
        }
        Ok(request.clone())
    }

    /// Incoming requests for owners, outgoing for advertisers. Newest first.
    pub fn requests_for(
        &self,
        user: UserId,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Page<BookingRequest> {
        let mut requests: Vec<&BookingRequest> = self
            .state
            .requests
            .values()
            .filter(|r| r.involves(user))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.space_id.map_or(true, |s| r.space_id == s))
            .collect();
        requests.sort_by_key(|r| Reverse((r.created_at, r.id)));
        page.paginate(requests.into_iter().cloned())
    }

    pub fn booking(&self, user: UserId, booking_id: BookingId) -> MarketResult<Booking> {
        let booking = self.booking_record(booking_id)?;
        if !booking.involves(user) {
            return Err(MarketError::forbidden("not a party to this booking"));
        }
        Ok(booking.clone())
    }

    /// Bookings the user is party to, soonest start first
    pub fn bookings_for(
        &self,
        user: UserId,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Page<Booking> {
        let mut bookings: Vec<&Booking> = self
            .state
            .bookings
            .values()
            .filter(|b| b.involves(user))
            .filter(|b| status.map_or(true, |s| b.status == s))
            .collect();
        bookings.sort_by_key(|b| (b.start_date, b.id));
        page.paginate(bookings.into_iter().cloned())
    }

    /// Either party may cancel a confirmed booking before it starts
    pub fn cancel_booking(
        &mut self,
        user: UserId,
        booking_id: BookingId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> MarketResult<Outcome<Booking>> {
        let booking = self.booking(user, booking_id)?;
        if !booking.is_confirmed() {
            return Err(MarketError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Cancelled.to_string(),
            });
        }
        if today >= booking.start_date {
            return Err(MarketError::conflict("booking has already started"));
        }

        let booking = {
            let stored = self
                .state
                .bookings
                .get_mut(&booking_id)
                .ok_or_else(|| MarketError::not_found("Booking", booking_id))?;
            stored.status = BookingStatus::Cancelled;
            stored.updated_at = now;
            stored.clone()
        };
        self.refresh_availability(booking.space_id, today, now);
        info!(booking_id = %booking_id, cancelled_by = %user, "booking cancelled");
        let event = MarketplaceEvent::new(
            [booking.owner_id, booking.advertiser_id],
            EventPayload::BookingUpdated {
                booking: booking.clone(),
            },
        );
        Ok(Outcome::new(booking, vec![event]))
    }

    /// Complete finished bookings, expire stale requests and re-derive
    /// listing availability for `today`.
    pub fn sweep(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Outcome<SweepReport> {
        let mut report = SweepReport::default();
        let mut events = Vec::new();

        for booking in self
            .state
            .bookings
            .values_mut()
            .filter(|b| b.is_confirmed() && b.end_date < today)
        {
            booking.status = BookingStatus::Completed;
            booking.updated_at = now;
            report.completed_bookings += 1;
            events.push(MarketplaceEvent::new(
                [booking.owner_id, booking.advertiser_id],
                EventPayload::BookingUpdated {
                    booking: booking.clone(),
                },
            ));
        }

        for request in self
            .state
            .requests
            .values_mut()
            .filter(|r| r.status == RequestStatus::Pending && r.start_date < today)
        {
            if let Err(e) =
                request.transition(RequestStatus::Rejected, Some(EXPIRED_NOTE.to_string()), now)
            {
                warn!(request_id = %request.id, error = %e, "could not expire request");
                continue;
            }
            report.expired_requests += 1;
            events.push(MarketplaceEvent::new(
                [request.owner_id, request.advertiser_id],
                EventPayload::RequestUpdated {
                    request: request.clone(),
                },
            ));
        }

        let space_ids: Vec<AdSpaceId> = self.state.spaces.keys().copied().collect();
        for id in space_ids {
            if self.refresh_availability(id, today, now) {
                report.spaces_updated += 1;
            }
        }

        if !report.is_empty() {
            info!(
                completed = report.completed_bookings,
                expired = report.expired_requests,
                spaces = report.spaces_updated,
                "sweep applied"
            );
        }
        Outcome::new(report, events)
    }

    fn owned_request(&self, owner: UserId, id: RequestId) -> MarketResult<&BookingRequest> {
        let request = self.request_record(id)?;
        if request.owner_id != owner {
            return Err(MarketError::forbidden("only the listing owner may decide"));
        }
        Ok(request)
    }

    fn ensure_dates_free(&self, space_id: AdSpaceId, range: &DateRange) -> MarketResult<()> {
        let taken = self
            .state
            .bookings
            .values()
            .any(|b| b.space_id == space_id && b.is_confirmed() && b.range().overlaps(range));
        if taken {
            return Err(MarketError::conflict(
                "ad space is already booked for some of these dates",
            ));
        }
        Ok(())
    }

    fn transition_request(
        &mut self,
        id: RequestId,
        next: RequestStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> MarketResult<BookingRequest> {
        let request = self
            .state
            .requests
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("Booking request", id))?;
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        request.transition(next, note, now)?;
        Ok(request.clone())
    }
}

fn ensure_pending(request: &BookingRequest, next: RequestStatus) -> MarketResult<()> {
    if !request.status.can_transition_to(next) {
        return Err(MarketError::InvalidTransition {
            from: request.status.to_string(),
            to: next.to_string(),
        });
    }
    Ok(())
}
