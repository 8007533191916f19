pub mod engine;

pub use engine::BatchUpsertEngine;
