//! Client layer for a DMART content-management backend.
//!
//! [`state`] holds the active backend/space and persists it; [`api`]
//! builds, sends and post-processes requests against whatever endpoint is
//! active when each call starts; [`space_config`] lists the selectable
//! backend profiles.

pub mod api;
pub mod space_config;
pub mod state;

pub use api::{ApiClient, ApiError};
pub use state::{ActiveSpace, EndpointConfig, StoreError};
