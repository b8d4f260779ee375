//! File formats at the edge of the crate.

pub mod export;
pub mod import;
