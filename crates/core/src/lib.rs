pub mod align;
pub mod categorize;
pub mod config;
pub mod error;
pub mod flow;
pub mod model;
pub mod semconv;
pub mod stats;
pub mod time;
pub mod tree;

pub use error::{Result, SpanDiffError};
