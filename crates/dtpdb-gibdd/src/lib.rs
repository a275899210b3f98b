//! HTTP client for the public road-accident statistics API.

mod client;
mod error;
mod types;

pub use client::GibddClient;
pub use error::GibddError;
pub use types::{CardQuery, QueryFilter, QueryOrder};
