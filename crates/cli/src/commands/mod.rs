//! CLI command implementations.

pub mod rate;
pub mod sync;
