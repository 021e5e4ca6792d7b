//! Print every entry of an index or map.

use super::lookup::Target;
use crate::index::{IndexName, IndexReader, IndexValue, MapReader, Offset};
use crate::osm::Location;
use crate::output::print_entry;
use anyhow::{Context, Result};
use std::path::Path;
use termcolor::WriteColor;

fn dump_index<V: IndexValue, W: WriteColor>(database: &Path, name: IndexName, out: &mut W) -> Result<usize> {
    let reader = IndexReader::<V>::open(database, name.as_str())?;
    tracing::debug!(path = %reader.path().display(), dense = reader.is_dense(), "dumping index");
    let mut entries = 0;
    for (id, value) in reader.iter() {
        print_entry(out, id, value)?;
        entries += 1;
    }
    Ok(entries)
}

/// Print `<id> <value>` for every present entry, in id order
pub fn dump<W: WriteColor>(database: &Path, target: Target, out: &mut W) -> Result<usize> {
    let entries = match target {
        Target::Index(IndexName::Locations) => {
            dump_index::<Location, W>(database, IndexName::Locations, out)
        }
        Target::Index(name) => dump_index::<Offset, W>(database, name, out),
        Target::Map(name) => {
            let reader = MapReader::open(database, name)?;
            let pairs = reader.pairs()?;
            for (referenced, referrer) in &pairs {
                print_entry(out, *referenced, referrer)?;
            }
            Ok(pairs.len())
        }
    };
    entries.with_context(|| format!("Dump of {} failed", target))
}
