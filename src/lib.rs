pub mod api;
pub mod batch;
pub mod config;
pub mod delivery;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod sync;
pub mod system;
pub mod watermark;

pub use error::{Result, UserSyncError};
