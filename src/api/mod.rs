//! Client for the DMART backend API.
//!
//! Operations are free functions over an [`ApiClient`]; each one resolves
//! the active endpoint when it starts building its request.

pub mod client;
pub mod content;
pub mod error;
pub mod media;
pub mod query;
pub mod types;
pub mod user;

pub use client::ApiClient;
pub use error::ApiError;
