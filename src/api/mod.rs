pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;

pub use server::{shutdown_signal, ApiServer};
pub use state::ApiState;
