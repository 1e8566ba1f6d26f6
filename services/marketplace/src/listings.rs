//! Ad space listing operations

use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Reverse;
use tracing::info;
use types::ad_space::{AdSpace, Availability, NewSpace, SpaceQuery, SpaceSort, SpaceUpdate};
use types::booking::RequestStatus;
use types::errors::{MarketError, MarketResult};
use types::ids::{AdSpaceId, UserId};
use types::pagination::{Page, PageRequest};
use types::user::Role;

use crate::engine::Marketplace;
use crate::events::{EventPayload, MarketplaceEvent, Outcome};

impl Marketplace {
    pub fn create_space(
        &mut self,
        owner: UserId,
        new: NewSpace,
        now: DateTime<Utc>,
    ) -> MarketResult<AdSpace> {
        self.require_role(owner, Role::Owner)?;
        new.validate()?;

        let space = AdSpace {
            id: AdSpaceId::at(now),
            owner_id: owner,
            title: new.title.trim().to_string(),
            description: new.description,
            category: new.category,
            location: new.location,
            dimensions: new.dimensions,
            images: new.images,
            pricing: new.pricing,
            footfall: new.footfall,
            availability: Availability::Available,
            created_at: now,
            updated_at: now,
        };
        info!(space_id = %space.id, owner_id = %owner, "ad space listed");
        self.state.spaces.insert(space.id, space.clone());
        Ok(space)
    }

    pub fn update_space(
        &mut self,
        owner: UserId,
        id: AdSpaceId,
        update: SpaceUpdate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> MarketResult<AdSpace> {
        update.validate()?;
        let derived = self.derived_availability(id, today);
        let space = self.owned_space_mut(owner, id)?;

        if let Some(title) = update.title {
            space.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            space.description = description;
        }
        if let Some(category) = update.category {
            space.category = category;
        }
        if let Some(location) = update.location {
            space.location = location;
        }
        if let Some(dimensions) = update.dimensions {
            space.dimensions = dimensions;
        }
        if let Some(images) = update.images {
            space.images = images;
        }
        if let Some(pricing) = update.pricing {
            space.pricing = pricing;
        }
        if let Some(footfall) = update.footfall {
            space.footfall = footfall;
        }
        match update.availability {
            Some(Availability::Unlisted) => space.availability = Availability::Unlisted,
            // Relisting picks up whatever the bookings say about today
            Some(_) => space.availability = derived,
            None => {}
        }
        space.updated_at = now;
        Ok(space.clone())
    }

    /// Remove a listing. Pending requests against it are cancelled.
    pub fn delete_space(
        &mut self,
        owner: UserId,
        id: AdSpaceId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> MarketResult<Outcome<AdSpace>> {
        self.owned_space_mut(owner, id)?;
        let blocked = self
            .state
            .bookings
            .values()
            .any(|b| b.space_id == id && b.is_confirmed() && b.end_date >= today);
        if blocked {
            return Err(MarketError::conflict(
                "ad space has confirmed bookings that have not ended",
            ));
        }

        let mut events = Vec::new();
        for request in self
            .state
            .requests
            .values_mut()
            .filter(|r| r.space_id == id && r.status == RequestStatus::Pending)
        {
            request.transition(
                RequestStatus::Cancelled,
                Some("listing removed".to_string()),
                now,
            )?;
            events.push(MarketplaceEvent::new(
                [request.advertiser_id],
                EventPayload::RequestUpdated {
                    request: request.clone(),
                },
            ));
        }

        let space = self
            .state
            .spaces
            .remove(&id)
            .ok_or_else(|| MarketError::not_found("Ad space", id))?;
        info!(space_id = %id, cancelled_requests = events.len(), "ad space removed");
        Ok(Outcome::new(space, events))
    }

    /// Read a listing. Unlisted spaces are only visible to their owner.
    pub fn space(&self, viewer: Option<UserId>, id: AdSpaceId) -> MarketResult<AdSpace> {
        let space = self.space_record(id)?;
        if space.availability == Availability::Unlisted && viewer != Some(space.owner_id) {
            return Err(MarketError::not_found("Ad space", id));
        }
        Ok(space.clone())
    }

    pub fn spaces_by_owner(&self, owner: UserId, page: PageRequest) -> Page<AdSpace> {
        let mut spaces: Vec<&AdSpace> = self
            .state
            .spaces
            .values()
            .filter(|s| s.owner_id == owner)
            .collect();
        spaces.sort_by_key(|s| Reverse((s.created_at, s.id)));
        page.paginate(spaces.into_iter().cloned())
    }

    pub fn search_spaces(&self, query: &SpaceQuery, page: PageRequest) -> Page<AdSpace> {
        let mut spaces: Vec<&AdSpace> = self
            .state
            .spaces
            .values()
            .filter(|s| query.matches(s))
            .collect();
        match query.sort {
            SpaceSort::Newest => spaces.sort_by_key(|s| Reverse((s.created_at, s.id))),
            SpaceSort::PriceAsc => {
                spaces.sort_by_key(|s| (s.pricing.amount, Reverse((s.created_at, s.id))))
            }
            SpaceSort::PriceDesc => {
                spaces.sort_by_key(|s| Reverse((s.pricing.amount, s.created_at, s.id)))
            }
            SpaceSort::Footfall => {
                spaces.sort_by_key(|s| Reverse((s.footfall.daily_average, s.created_at, s.id)))
            }
        }
        page.paginate(spaces.into_iter().cloned())
    }

    /// Availability implied by confirmed bookings on `today`
    pub(crate) fn derived_availability(&self, id: AdSpaceId, today: NaiveDate) -> Availability {
        let booked = self
            .state
            .bookings
            .values()
            .any(|b| b.space_id == id && b.is_active_on(today));
        if booked {
            Availability::Booked
        } else {
            Availability::Available
        }
    }

    /// Re-derive availability, leaving unlisted spaces alone. Returns whether it changed.
    pub(crate) fn refresh_availability(
        &mut self,
        id: AdSpaceId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> bool {
        let derived = self.derived_availability(id, today);
        match self.state.spaces.get_mut(&id) {
            Some(space)
                if space.availability != Availability::Unlisted
                    && space.availability != derived =>
            {
                space.availability = derived;
                space.updated_at = now;
                true
            }
            _ => false,
        }
    }
}
