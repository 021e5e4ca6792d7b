//! Batch pipelines that write a database: import, update, location cache
//! rebuild, and export/convert of raw records.

pub mod export;
pub mod import;
pub mod locations;
pub mod update;

pub use export::{convert, export_range, OutputFormat, WriteMode};
pub use import::{run_import, ImportState, Importer};
pub use locations::rebuild_locations;
pub use update::{run_update, Updater};
