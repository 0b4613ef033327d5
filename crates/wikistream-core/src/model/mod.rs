//! Typed views of well-known event schemas.

pub mod recentchange;

pub use recentchange::{ChangeType, EventMeta, OldNew, RecentChange};
