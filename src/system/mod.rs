pub mod adapter;
pub mod http;
pub mod memory;

pub use adapter::{PageKey, SystemConnector, SystemDescriptor, WriteReceipt};
pub use http::HttpSystem;
pub use memory::MemorySystem;

use crate::config::{SystemConfig, SystemKind};
use crate::error::Result;
use crate::models::SystemId;
use std::sync::Arc;

/// Build the connector described by a system's configuration
pub fn create_connector(id: SystemId, config: &SystemConfig) -> Result<Arc<dyn SystemConnector>> {
    let descriptor = SystemDescriptor::from_config(id, config);
    match &config.kind {
        SystemKind::Memory => Ok(Arc::new(MemorySystem::new(descriptor))),
        SystemKind::Http(http) => Ok(Arc::new(HttpSystem::new(descriptor, http.clone())?)),
    }
}
