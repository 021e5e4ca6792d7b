//! Position indexes and adjacency multimaps.

pub mod any;
pub mod dense;
pub mod multimap;
pub mod reader;
pub mod sparse;
pub mod types;

pub use any::{AnyIndex, PositionIndex};
pub use multimap::{MultimapView, RelationMaps, SparseMultimap};
pub use reader::{IndexReader, MapReader};
pub use types::*;
