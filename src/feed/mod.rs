pub mod dedup;
pub mod fallback;
pub mod ledger;
pub mod models;
pub mod service;
pub mod snapshot;

pub use service::{FeedService, NewsFilter};
