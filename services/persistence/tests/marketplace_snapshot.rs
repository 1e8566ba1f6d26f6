//! Round-trips a populated marketplace through a snapshot file

use chrono::{NaiveDate, TimeZone, Utc};
use marketplace::{Marketplace, MarketplaceState};
use persistence::{Snapshot, SnapshotLoader, SnapshotWriter};
use rust_decimal::Decimal;
use tempfile::TempDir;
use types::ad_space::{Footfall, Location, NewSpace, Pricing, PricingUnit, SpaceCategory};
use types::booking::NewRequest;
use types::user::{NewUser, Role};

fn populated() -> Marketplace {
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
    let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    let mut market = Marketplace::new();

    let mut user = |email: &str, role| {
        market
            .register(
                NewUser {
                    name: "Test".to_string(),
                    email: email.to_string(),
                    password: "correct-horse-battery".to_string(),
                    role,
                    company: Some("Acme".to_string()),
                    phone: None,
                },
                now,
            )
            .unwrap()
            .id
    };
    let owner = user("owner@example.com", Role::Owner);
    let advertiser = user("adv@example.com", Role::Advertiser);

    let space = market
        .create_space(
            owner,
            NewSpace {
                title: "Station Lightbox".to_string(),
                description: "Backlit panel at the east exit".to_string(),
                category: SpaceCategory::Transit,
                location: Location {
                    address: "Platform 1".to_string(),
                    city: "Pune".to_string(),
                    region: Some("MH".to_string()),
                    latitude: Some(18.52),
                    longitude: Some(73.85),
                },
                dimensions: None,
                images: vec!["https://cdn.example.com/a.jpg".to_string()],
                pricing: Pricing {
                    amount: Decimal::new(12_550, 2),
                    unit: PricingUnit::Week,
                    currency: "INR".to_string(),
                },
                footfall: Footfall {
                    daily_average: 40_000,
                    peak_hours: Some("8-10am".to_string()),
                    audience: None,
                },
            },
            now,
        )
        .unwrap();

    let request = market
        .request_booking(
            advertiser,
            space.id,
            NewRequest {
                start_date: today,
                end_date: today + chrono::Duration::days(9),
                message: Some("Launch campaign".to_string()),
            },
            today,
            now,
        )
        .unwrap()
        .value;
    market
        .approve_request(owner, request.id, None, today, now)
        .unwrap();

    let conversation = market
        .open_conversation(advertiser, owner, Some(space.id), now)
        .unwrap();
    market
        .send_message(advertiser, conversation.id, "Thanks!", now)
        .unwrap();
    market
}

#[test]
fn test_marketplace_state_survives_snapshot() {
    let tmp = TempDir::new().unwrap();
    let market = populated();
    let state = market.state().clone();

    for compress in [false, true] {
        let snapshot = Snapshot::new(9, 1_780_304_400_000, state.clone(), compress).unwrap();
        let path = SnapshotWriter::new(tmp.path(), compress)
            .write(&snapshot)
            .unwrap();
        let loaded: Snapshot<MarketplaceState> =
            SnapshotLoader::new(tmp.path()).load(&path).unwrap();
        assert_eq!(loaded.state, state);
    }

    let restored = Marketplace::from_state(
        SnapshotLoader::new(tmp.path())
            .load_latest::<MarketplaceState>()
            .unwrap()
            .state,
    );
    assert_eq!(restored.stats(), market.stats());
    assert_eq!(restored.stats().bookings, 1);
    assert_eq!(restored.stats().messages, 1);
    // Password hashes survive, so existing accounts can still log in
    assert!(restored
        .authenticate("owner@example.com", "correct-horse-battery")
        .is_ok());
}
