pub mod batch;
pub mod direction;
pub mod record;
pub mod watermark;

pub use batch::*;
pub use direction::{SyncDirection, SystemId};
pub use record::Record;
pub use watermark::{Watermark, WATERMARK_FORMAT};
