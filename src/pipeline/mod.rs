pub mod filter;
pub mod orchestrator;
pub mod poller;
pub mod sanitizer;

pub use filter::{should_propagate, FilterDecision, SyncFilter};
pub use orchestrator::{
    DirectionState, DirectionStatus, HealthReport, RunReport, SyncOrchestrator,
};
pub use poller::{ChangePoller, PollOutcome, RecordStream};
pub use sanitizer::{sanitize, FieldSanitizer};
