//! Pawmap backend API client
//!
//! Typed access to the pet rescue backend: validated geographic values, the
//! entity model shared by every map page, response envelopes and the REST
//! client used for map queries, list browsing and application workflows.
//!
//! # Architecture
//!
//! - [`geo`]: `Position` and `SearchRadius` value types, haversine distance
//! - [`models`]: `Entity` snapshot and per-category wire records
//! - [`envelope`]: `{resultCode, message, data}` wrapper and `Page<T>`
//! - [`client`]: `ApiClient` trait and its `reqwest` implementation
//! - [`error`]: error taxonomy for network, status and validation failures

pub mod client;
pub mod envelope;
pub mod error;
pub mod geo;
pub mod models;

pub use client::{ApiClient, ApplicationAction, ApplyTarget, HttpApiClient};
pub use envelope::{ApiEnvelope, MutationAck, Page};
pub use error::{ApiError, Result};
pub use geo::{Position, SearchRadius};
pub use models::{
    decode_entity, AnimalCounts, Entity, EntityCategory, EntityDetail, EntityId, EntityStatus,
};
