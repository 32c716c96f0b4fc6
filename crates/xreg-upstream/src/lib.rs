//! Upstream HTTP fetcher, metadata cache, and name index shared by every
//! ecosystem adapter (spec §4.6, §4.7, §4.8).

pub mod cache;
pub mod fetcher;
pub mod name_index;

pub use cache::{CacheConfig, CacheKey, CacheMetrics, EntityKeyKind, MetadataCache};
pub use fetcher::{Fetcher, FetcherConfig, UpstreamAuth, UpstreamError};
pub use name_index::{CatalogSource, NameIndex, TRIGRAM_THRESHOLD};
