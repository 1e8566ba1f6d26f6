//! Fixtures shared by the engine's unit tests

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use types::ad_space::{Footfall, Location, NewSpace, Pricing, PricingUnit, SpaceCategory};
use types::booking::NewRequest;
use types::ids::UserId;
use types::user::{NewUser, Role};

use crate::engine::Marketplace;

/// Fixed instant `secs` seconds after the test epoch
pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

/// Calendar day `offset` days after the test epoch
pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).unwrap() + Duration::days(offset)
}

pub fn register(market: &mut Marketplace, email: &str, role: Role) -> UserId {
    market
        .register(
            NewUser {
                name: email.split('@').next().unwrap_or("user").to_string(),
                email: email.to_string(),
                password: "correct-horse-battery".to_string(),
                role,
                company: None,
                phone: None,
            },
            t(0),
        )
        .unwrap()
        .id
}

/// Daily-priced listing in Pune
pub fn new_space(title: &str, price_per_day: i64) -> NewSpace {
    NewSpace {
        title: title.to_string(),
        description: format!("{} near the main junction", title),
        category: SpaceCategory::DigitalScreen,
        location: Location {
            address: "1 MG Road".to_string(),
            city: "Pune".to_string(),
            region: None,
            latitude: None,
            longitude: None,
        },
        dimensions: None,
        images: Vec::new(),
        pricing: Pricing {
            amount: Decimal::from(price_per_day),
            unit: PricingUnit::Day,
            currency: "USD".to_string(),
        },
        footfall: Footfall {
            daily_average: 5_000,
            peak_hours: None,
            audience: None,
        },
    }
}

pub fn new_request(start: i64, end: i64) -> NewRequest {
    NewRequest {
        start_date: day(start),
        end_date: day(end),
        message: None,
    }
}
