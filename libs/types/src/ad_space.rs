//! Ad space listing types
//!
//! An ad space is a physical advertising surface (billboard, screen, wall...)
//! listed by an owner with pricing and footfall data.

use crate::errors::{MarketError, MarketResult};
use crate::ids::{AdSpaceId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpaceCategory {
    Billboard,
    DigitalScreen,
    Transit,
    Wall,
    Mall,
    Kiosk,
    Other,
}

/// Billing period the listed price refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingUnit {
    Day,
    Week,
    Month,
}

impl PricingUnit {
    /// Number of billable units for an inclusive span of `days`
    pub fn billable_units(&self, days: u32) -> u32 {
        match self {
            PricingUnit::Day => days,
            PricingUnit::Week => days.div_ceil(7),
            PricingUnit::Month => days.div_ceil(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub amount: Decimal,
    pub unit: PricingUnit,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Pricing {
    pub fn validate(&self) -> MarketResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(MarketError::validation("price must be positive"));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(MarketError::validation(
                "currency must be a 3-letter uppercase code",
            ));
        }
        Ok(())
    }

    /// Total price for an inclusive span of `days`
    pub fn quote(&self, days: u32) -> Decimal {
        self.amount * Decimal::from(self.unit.billable_units(days))
    }
}

/// Audience data supplied by the owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footfall {
    pub daily_average: u64,
    #[serde(default)]
    pub peak_hours: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Location {
    pub fn validate(&self) -> MarketResult<()> {
        if self.address.trim().is_empty() || self.city.trim().is_empty() {
            return Err(MarketError::validation("address and city are required"));
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(MarketError::validation("latitude out of range"));
            }
        }
        if let Some(lng) = self.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                return Err(MarketError::validation("longitude out of range"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: Decimal,
    pub height: Decimal,
    pub unit: String,
}

/// Listing availability
///
/// `Booked` is derived from confirmed bookings covering the current day;
/// owners only toggle between `Available` and `Unlisted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Available,
    Booked,
    Unlisted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdSpace {
    pub id: AdSpaceId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub category: SpaceCategory,
    pub location: Location,
    pub dimensions: Option<Dimensions>,
    pub images: Vec<String>,
    pub pricing: Pricing,
    pub footfall: Footfall,
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdSpace {
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }

    /// Whether new booking requests may be raised against this listing
    pub fn accepts_requests(&self) -> bool {
        !matches!(self.availability, Availability::Unlisted)
    }
}

/// Listing creation payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewSpace {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: SpaceCategory,
    pub location: Location,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub images: Vec<String>,
    pub pricing: Pricing,
    pub footfall: Footfall,
}

impl NewSpace {
    pub fn validate(&self) -> MarketResult<()> {
        validate_title(&self.title)?;
        validate_description(&self.description)?;
        self.location.validate()?;
        if let Some(dims) = &self.dimensions {
            validate_dimensions(dims)?;
        }
        validate_images(&self.images)?;
        self.pricing.validate()
    }
}

/// Partial listing update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpaceUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<SpaceCategory>,
    pub location: Option<Location>,
    /// `null` clears the dimensions; an absent field leaves them alone
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub dimensions: Option<Option<Dimensions>>,
    pub images: Option<Vec<String>>,
    pub pricing: Option<Pricing>,
    pub footfall: Option<Footfall>,
    pub availability: Option<Availability>,
}

impl SpaceUpdate {
    pub fn validate(&self) -> MarketResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        if let Some(Some(dims)) = &self.dimensions {
            validate_dimensions(dims)?;
        }
        if let Some(images) = &self.images {
            validate_images(images)?;
        }
        if let Some(pricing) = &self.pricing {
            pricing.validate()?;
        }
        if matches!(self.availability, Some(Availability::Booked)) {
            return Err(MarketError::validation(
                "availability BOOKED is set by confirmed bookings",
            ));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> MarketResult<()> {
    let len = title.trim().chars().count();
    if len == 0 || len > MAX_TITLE_LEN {
        return Err(MarketError::validation(format!(
            "title must be 1..={} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> MarketResult<()> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(MarketError::validation(format!(
            "description exceeds {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

fn validate_dimensions(dims: &Dimensions) -> MarketResult<()> {
    if dims.width <= Decimal::ZERO || dims.height <= Decimal::ZERO {
        return Err(MarketError::validation("dimensions must be positive"));
    }
    Ok(())
}

fn validate_images(images: &[String]) -> MarketResult<()> {
    if images.len() > MAX_IMAGES {
        return Err(MarketError::validation(format!(
            "at most {} images per listing",
            MAX_IMAGES
        )));
    }
    if let Some(bad) = images
        .iter()
        .find(|url| !(url.starts_with("https://") || url.starts_with("http://")))
    {
        return Err(MarketError::validation(format!("invalid image url: {}", bad)));
    }
    Ok(())
}

/// Ordering for public search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Footfall,
}

impl fmt::Display for SpaceSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpaceSort::Newest => "newest",
            SpaceSort::PriceAsc => "price_asc",
            SpaceSort::PriceDesc => "price_desc",
            SpaceSort::Footfall => "footfall",
        };
        f.write_str(s)
    }
}

/// Public search filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceQuery {
    pub q: Option<String>,
    pub city: Option<String>,
    pub category: Option<SpaceCategory>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_footfall: Option<u64>,
    #[serde(default)]
    pub available_only: bool,
    #[serde(default)]
    pub sort: SpaceSort,
}

impl SpaceQuery {
    pub fn matches(&self, space: &AdSpace) -> bool {
        if space.availability == Availability::Unlisted {
            return false;
        }
        if self.available_only && space.availability != Availability::Available {
            return false;
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            let hit = space.title.to_lowercase().contains(&needle)
                || space.description.to_lowercase().contains(&needle)
                || space.location.city.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if space.location.city.to_lowercase() != city.trim().to_lowercase() {
                return false;
            }
        }
        if let Some(category) = self.category {
            if space.category != category {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if space.pricing.amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if space.pricing.amount > max {
                return false;
            }
        }
        if let Some(min) = self.min_footfall {
            if space.footfall.daily_average < min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_space() -> AdSpace {
        let now = Utc::now();
        AdSpace {
            id: AdSpaceId::new(),
            owner_id: UserId::new(),
            title: "Ring Road Billboard".to_string(),
            description: "Lit 48-sheet facing inbound traffic".to_string(),
            category: SpaceCategory::Billboard,
            location: Location {
                address: "12 Ring Road".to_string(),
                city: "Pune".to_string(),
                region: None,
                latitude: Some(18.52),
                longitude: Some(73.85),
            },
            dimensions: None,
            images: vec!["https://cdn.example.com/a.jpg".to_string()],
            pricing: Pricing {
                amount: Decimal::from(500),
                unit: PricingUnit::Week,
                currency: "USD".to_string(),
            },
            footfall: Footfall {
                daily_average: 12_000,
                peak_hours: None,
                audience: None,
            },
            availability: Availability::Available,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_billable_units_round_up() {
        assert_eq!(PricingUnit::Day.billable_units(10), 10);
        assert_eq!(PricingUnit::Week.billable_units(7), 1);
        assert_eq!(PricingUnit::Week.billable_units(8), 2);
        assert_eq!(PricingUnit::Month.billable_units(1), 1);
        assert_eq!(PricingUnit::Month.billable_units(31), 2);
    }

    #[test]
    fn test_quote() {
        let pricing = Pricing {
            amount: Decimal::new(9999, 2),
            unit: PricingUnit::Day,
            currency: "USD".to_string(),
        };
        assert_eq!(pricing.quote(3), Decimal::new(29997, 2));
    }

    #[test]
    fn test_pricing_rejects_non_positive() {
        let pricing = Pricing {
            amount: Decimal::ZERO,
            unit: PricingUnit::Day,
            currency: "USD".to_string(),
        };
        assert!(pricing.validate().is_err());
    }

    #[test]
    fn test_pricing_rejects_bad_currency() {
        let pricing = Pricing {
            amount: Decimal::ONE,
            unit: PricingUnit::Day,
            currency: "usd".to_string(),
        };
        assert!(pricing.validate().is_err());
    }

    #[test]
    fn test_location_range_checks() {
        let mut location = sample_space().location;
        assert!(location.validate().is_ok());
        location.latitude = Some(91.0);
        assert!(location.validate().is_err());
    }

    #[test]
    fn test_update_cannot_force_booked() {
        let update = SpaceUpdate {
            availability: Some(Availability::Booked),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_images_must_be_urls() {
        assert!(validate_images(&["ftp://x".to_string()]).is_err());
        let too_many = vec!["https://x/y.png".to_string(); MAX_IMAGES + 1];
        assert!(validate_images(&too_many).is_err());
    }

    #[test]
    fn test_query_filters() {
        let space = sample_space();

        assert!(SpaceQuery::default().matches(&space));
        assert!(SpaceQuery {
            q: Some("inbound".to_string()),
            ..Default::default()
        }
        .matches(&space));
        assert!(SpaceQuery {
            city: Some("pune".to_string()),
            ..Default::default()
        }
        .matches(&space));
        assert!(!SpaceQuery {
            city: Some("mumbai".to_string()),
            ..Default::default()
        }
        .matches(&space));
        assert!(!SpaceQuery {
            max_price: Some(Decimal::from(100)),
            ..Default::default()
        }
        .matches(&space));
        assert!(!SpaceQuery {
            min_footfall: Some(20_000),
            ..Default::default()
        }
        .matches(&space));
        assert!(!SpaceQuery {
            category: Some(SpaceCategory::Kiosk),
            ..Default::default()
        }
        .matches(&space));
    }

    #[test]
    fn test_city_filter_folds_non_ascii_case() {
        let mut space = sample_space();
        space.location.city = "MÜNCHEN".to_string();
        assert!(SpaceQuery {
            city: Some("münchen".to_string()),
            ..Default::default()
        }
        .matches(&space));
        assert!(SpaceQuery {
            city: Some(" München ".to_string()),
            ..Default::default()
        }
        .matches(&space));
    }

    #[test]
    fn test_update_distinguishes_null_from_absent_dimensions() {
        let absent: SpaceUpdate = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(absent.dimensions, None);

        let cleared: SpaceUpdate = serde_json::from_str(r#"{"dimensions": null}"#).unwrap();
        assert_eq!(cleared.dimensions, Some(None));

        let set: SpaceUpdate = serde_json::from_str(
            r#"{"dimensions": {"width": "4.5", "height": "3", "unit": "m"}}"#,
        )
        .unwrap();
        let dims = set.dimensions.clone().unwrap().unwrap();
        assert_eq!(dims.width, Decimal::new(45, 1));
        assert!(set.validate().is_ok());
    }

    #[test]
    fn test_unlisted_never_matches() {
        let mut space = sample_space();
        space.availability = Availability::Unlisted;
        assert!(!SpaceQuery::default().matches(&space));
    }

    #[test]
    fn test_available_only_excludes_booked() {
        let mut space = sample_space();
        space.availability = Availability::Booked;
        assert!(SpaceQuery::default().matches(&space));
        assert!(!SpaceQuery {
            available_only: true,
            ..Default::default()
        }
        .matches(&space));
    }
}
