mod api;
pub mod clock;
pub mod config;
mod error;
mod market;
pub mod metrics;
pub mod sessions;
pub mod store;

pub use api::Api;
pub use error::Error;
pub use market::{Ledger, Market};
