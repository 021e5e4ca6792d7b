//! Read-only tools over a finished database.
//!
//! - [`lookup`] - Point lookups in an index or map
//! - [`dump`] - Every entry of an index or map
//! - [`stats`] - Metadata, entry counts and file sizes

pub mod dump;
pub mod lookup;
pub mod stats;

pub use dump::dump;
pub use lookup::{lookup, Target};
pub use stats::show_stats;
