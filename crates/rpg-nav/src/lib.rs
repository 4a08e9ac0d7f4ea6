//! The query surface: Search, Fetch and Explore, the three read-only
//! operations downstream agents consume. Each is a thin wrapper over
//! [`rpg_core::store::GraphStore`] — the store itself already owns the
//! BM25 text index, the vector index and Reciprocal Rank Fusion; this
//! crate only adds staged-fallback search composition, result dedup, and
//! the Fetch feature-path chain.

pub mod explore;
pub mod fetch;
pub mod search;

pub use explore::{explore, ExploreResult};
pub use fetch::{fetch, FetchOutcome, FetchedEntity};
pub use search::{search, SearchHit, SearchMode, SearchParams, SearchStrategy};
