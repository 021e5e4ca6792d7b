//! Point lookups of ids in an index or map.

use crate::error::ReturnCode;
use crate::index::{IndexName, IndexReader, IndexValue, MapName, MapReader, Offset};
use crate::osm::{Location, ObjectId};
use crate::output::{print_entry, print_not_found};
use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use termcolor::WriteColor;

/// What a lookup or dump reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Index(IndexName),
    Map(MapName),
}

impl Target {
    /// Exactly one of `index` and `map` has to be given
    pub fn from_names(index: Option<&str>, map: Option<&str>) -> crate::error::Result<Self> {
        match (index, map) {
            (Some(index), None) => Ok(Target::Index(index.parse()?)),
            (None, Some(map)) => Ok(Target::Map(map.parse()?)),
            _ => Err(crate::error::Error::Config(
                "Need exactly one of --index/-i or --map/-m".to_string(),
            )),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Index(name) => write!(f, "index {}", name),
            Target::Map(name) => write!(f, "map {}", name),
        }
    }
}

fn lookup_index<V: IndexValue, W: WriteColor>(
    database: &Path,
    name: IndexName,
    ids: &[ObjectId],
    all: bool,
    out: &mut W,
) -> Result<bool> {
    let reader = IndexReader::<V>::open(database, name.as_str())?;
    let mut all_found = true;
    for &id in ids {
        let values = if all {
            reader.get_all(id)
        } else {
            reader.get(id).found().into_iter().collect()
        };
        if values.is_empty() {
            all_found = false;
            print_not_found(out, id)?;
        }
        for value in values {
            print_entry(out, id, value)?;
        }
    }
    Ok(all_found)
}

fn lookup_map<W: WriteColor>(
    database: &Path,
    name: MapName,
    ids: &[ObjectId],
    out: &mut W,
) -> Result<bool> {
    let reader = MapReader::open(database, name)?;
    let mut all_found = true;
    for &id in ids {
        let referrers = reader.get_all(id)?;
        if referrers.is_empty() {
            all_found = false;
            print_not_found(out, id)?;
        }
        for referrer in referrers {
            print_entry(out, id, referrer)?;
        }
    }
    Ok(all_found)
}

/// Print the values of `ids`; `NotFound` if any id is missing
///
/// With `all`, every duplicate stored in a sparse index is printed instead of
/// only the last one. Maps always print every referrer.
pub fn lookup<W: WriteColor>(
    database: &Path,
    target: Target,
    ids: &[ObjectId],
    all: bool,
    out: &mut W,
) -> Result<ReturnCode> {
    let found = match target {
        Target::Index(IndexName::Locations) => {
            lookup_index::<Location, W>(database, IndexName::Locations, ids, all, out)
        }
        Target::Index(name) => lookup_index::<Offset, W>(database, name, ids, all, out),
        Target::Map(name) => lookup_map(database, name, ids, out),
    }
    .with_context(|| format!("Lookup in {} failed", target))?;

    Ok(if found {
        ReturnCode::Okay
    } else {
        ReturnCode::NotFound
    })
}
