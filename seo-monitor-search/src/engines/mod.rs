//! Built-in search engine strategies.
//!
//! Each module provides a struct implementing
//! [`crate::engine::EngineQueryStrategy`] for one engine's results page.

pub mod bing;
pub mod google;

pub use bing::BingStrategy;
pub use google::GoogleStrategy;
