//! Campaign repository: read-side queries for the serving engine and the
//! append-only visitor event log.
//!
//! `PgCampaignRepository` is the production backend. `InMemoryRepository`
//! serves development mode and tests with the same trait surface.

#![warn(clippy::unwrap_used)]

pub mod memory;
pub mod postgres;
pub mod repository;
pub mod schema;

pub use memory::InMemoryRepository;
pub use postgres::PgCampaignRepository;
pub use repository::{load_candidates, load_lookups, CampaignLookups, CampaignRepository};
