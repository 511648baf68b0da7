//! casegen library crate
//!
//! Exposes the generation pipeline so the CLI, the HTTP API and the
//! benchmarks share one implementation.

pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod generate;
pub mod model;
pub mod registry;
pub mod server;
pub mod store;
pub mod util;

pub use error::{GenerationError, Result};
