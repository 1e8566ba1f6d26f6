use chrono::{DateTime, Utc};
use marketplace::StateStats;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ad_space::{SpaceCategory, SpaceQuery, SpaceSort};
use types::booking::{BookingStatus, RequestFilter, RequestStatus};
use types::chat::ConversationSummary;
use types::ids::{AdSpaceId, MessageId, UserId};
use types::pagination::{DEFAULT_PAGE_LIMIT, Page, PageRequest};
use types::user::PublicUser;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: PublicUser,
}

/// Another user's profile as seen by a signed-in caller
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: PublicUser,
    pub online: bool,
}

/// Plain paging parameters (`?page=&limit=`)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PageParams {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        )
    }
}

/// Public search query string. Kept flat since query strings cannot carry
/// nested structures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
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
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl SearchParams {
    /// Normalized query; equal searches produce equal cache keys
    pub fn query(&self) -> SpaceQuery {
        let norm = |s: &Option<String>| {
            s.as_deref()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
        };
        SpaceQuery {
            q: norm(&self.q),
            city: norm(&self.city),
            category: self.category,
            min_price: self.min_price,
            max_price: self.max_price,
            min_footfall: self.min_footfall,
            available_only: self.available_only,
            sort: self.sort,
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
        .page_request()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestListParams {
    pub status: Option<RequestStatus>,
    pub space_id: Option<AdSpaceId>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl RequestListParams {
    pub fn filter(&self) -> RequestFilter {
        RequestFilter {
            status: self.status,
            space_id: self.space_id,
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
        .page_request()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingListParams {
    pub status: Option<BookingStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl BookingListParams {
    pub fn page_request(&self) -> PageRequest {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
        .page_request()
    }
}

/// Optional note attached to an approval or rejection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenConversationRequest {
    pub participant_id: UserId,
    #[serde(default)]
    pub space_id: Option<AdSpaceId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryParams {
    pub before: Option<MessageId>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationList {
    #[serde(flatten)]
    pub page: Page<ConversationSummary>,
    pub unread_total: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReadReceipt {
    pub marked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub revision: u64,
    pub online_users: usize,
    pub documents: StateStats,
}
