pub mod scheduler;
pub mod service;

pub use scheduler::SyncScheduler;
pub use service::SyncService;
