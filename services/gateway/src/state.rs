use crate::auth::TokenKeys;
use crate::cache::SpaceCache;
use crate::config::GatewayConfig;
use crate::error::AppError;
use crate::hub::Hub;
use crate::rate_limit::{RateLimiter, RateLimits};
use chrono::{DateTime, NaiveDate, Utc};
use marketplace::{Marketplace, Outcome, SweepReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;
use types::errors::MarketResult;

/// Wall clock captured once per mutation
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl Clock {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            now,
            today: now.date_naive(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub market: Arc<RwLock<Marketplace>>,
    /// Count of applied mutations; snapshots are numbered by it
    pub revision: Arc<AtomicU64>,
    pub hub: Arc<Hub>,
    pub cache: SpaceCache,
    pub rate_limiter: Arc<RateLimiter>,
    pub limits: RateLimits,
    pub tokens: Arc<TokenKeys>,
    pub config: Arc<GatewayConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: GatewayConfig, market: Marketplace, revision: u64) -> Self {
        Self {
            market: Arc::new(RwLock::new(market)),
            revision: Arc::new(AtomicU64::new(revision)),
            hub: Arc::new(Hub::new()),
            cache: SpaceCache::new(config.cache_capacity, config.cache_ttl()),
            rate_limiter: Arc::new(RateLimiter::new()),
            limits: RateLimits::default(),
            tokens: Arc::new(TokenKeys::new(config.jwt_secret.as_bytes(), config.jwt_ttl())),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn with_limits(mut self, limits: RateLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Run a mutation that cannot affect listings
    pub async fn apply<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Marketplace, Clock) -> MarketResult<Outcome<T>>,
    {
        self.apply_inner(false, op).await
    }

    /// Run a mutation that may change listings or their availability
    pub async fn apply_listings<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Marketplace, Clock) -> MarketResult<Outcome<T>>,
    {
        self.apply_inner(true, op).await
    }

    async fn apply_inner<T, F>(&self, touches_listings: bool, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Marketplace, Clock) -> MarketResult<Outcome<T>>,
    {
        let mut market = self.market.write().await;
        let outcome = op(&mut market, Clock::now())?;
        self.revision.fetch_add(1, Ordering::AcqRel);
        if touches_listings {
            self.cache.invalidate();
        }
        // Published under the lock so clients see events in mutation order
        self.hub.publish_all(&outcome.events);
        Ok(outcome.value)
    }

    /// Complete finished bookings, expire stale requests and refresh
    /// availability. A sweep that changes nothing does not count as a mutation.
    pub async fn sweep(&self) -> SweepReport {
        let mut market = self.market.write().await;
        let clock = Clock::now();
        let outcome = market.sweep(clock.today, clock.now);
        if !outcome.value.is_empty() {
            self.revision.fetch_add(1, Ordering::AcqRel);
            self.cache.invalidate();
            self.hub.publish_all(&outcome.events);
            debug!(today = %clock.today, events = outcome.events.len(), "sweep events published");
        }
        outcome.value
    }

    pub async fn read<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&Marketplace) -> MarketResult<T>,
    {
        let market = self.market.read().await;
        Ok(op(&market)?)
    }
}
