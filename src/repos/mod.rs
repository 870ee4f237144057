// Repository cache.
// Normalized records, the durable SQLite snapshot, and the manager tying both cache layers together.

pub mod manager;
pub mod record;
pub mod store;

pub use manager::{
    CacheStatus, ClearReport, DEFAULT_LIST_LIMIT, ListQuery, MAX_LIST_LIMIT, RepoCacheManager,
    ResponseCacheStatus, SyncReport, SyncSettings, is_fresh,
};
pub use record::{FEATURED_MIN_STARS, RepoRecord, is_featured, normalize};
pub use store::{CachedRepository, RepoStore};
