//! Exactly-once helpers layered on top of at-least-once polling

pub mod boundary;
pub mod echo_guard;

pub use boundary::BoundaryLedger;
pub use echo_guard::EchoGuard;
