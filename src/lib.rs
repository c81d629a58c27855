// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod broadcast;
pub mod dedup;
pub mod extract;
pub mod metrics;
pub mod poller;
pub mod queue;
pub mod sources;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::broadcast::SubscriberSet;
pub use crate::extract::Item;
pub use crate::sources::{AppConfig, SourceDescriptor, StrategyKind};
