//! Listing read cache using moka
//!
//! Entries are keyed by a generation counter that every listing mutation
//! bumps while it still holds the engine write lock. Readers capture the
//! generation under the read lock, so a page computed from old documents can
//! never be served after the mutation that made it stale.

use moka::future::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use types::ad_space::{AdSpace, SpaceQuery};
use types::ids::AdSpaceId;
use types::pagination::{Page, PageRequest};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub generation: u64,
    pub query: SpaceQuery,
    pub page: PageRequest,
}

#[derive(Clone)]
pub struct SpaceCache {
    generation: Arc<AtomicU64>,
    searches: Cache<SearchKey, Arc<Page<AdSpace>>>,
    spaces: Cache<(u64, AdSpaceId), Arc<AdSpace>>,
}

impl SpaceCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            searches: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            spaces: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Read while holding the engine lock
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Call while holding the engine write lock
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.searches.invalidate_all();
        self.spaces.invalidate_all();
    }

    pub async fn search(&self, key: &SearchKey) -> Option<Arc<Page<AdSpace>>> {
        self.searches.get(key).await
    }

    pub async fn store_search(&self, key: SearchKey, page: Page<AdSpace>) -> Arc<Page<AdSpace>> {
        let page = Arc::new(page);
        self.searches.insert(key, Arc::clone(&page)).await;
        page
    }

    pub async fn space(&self, generation: u64, id: AdSpaceId) -> Option<Arc<AdSpace>> {
        self.spaces.get(&(generation, id)).await
    }

    /// Only publicly visible listings belong here; unlisted ones are
    /// owner-only and always read through.
    pub async fn store_space(&self, generation: u64, space: AdSpace) -> Arc<AdSpace> {
        let space = Arc::new(space);
        self.spaces
            .insert((generation, space.id), Arc::clone(&space))
            .await;
        space
    }
}
