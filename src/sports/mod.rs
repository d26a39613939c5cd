pub mod client;
pub mod models;
pub mod normalizer;

pub use client::{FetchError, MatchSource, SportScoreClient};
pub use models::{Match, RawMatch, Sport};
pub use normalizer::normalize_batch;
