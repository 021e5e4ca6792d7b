//! Utility functions and data structures.
//!
//! - [`mapped_file`] - Read-only memory mapping with explicit close
//! - [`encoding`] - Fixed-width little/big-endian helpers for on-disk records
//! - [`paths`] - Database directory layout
//! - [`progress`] - Spinner that compiles away without the `progress` feature

pub mod encoding;
pub mod mapped_file;
pub mod paths;
pub mod progress;

pub use encoding::*;
pub use mapped_file::MappedFile;
pub use paths::*;
