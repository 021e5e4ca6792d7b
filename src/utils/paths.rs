use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE: &str = "test.eodb";
pub const DATA_FILE: &str = "data.osr";
pub const META_FILE: &str = "meta.json";

/// Path of the object log inside a database directory
pub fn data_file_name(database: &Path) -> PathBuf {
    database.join(DATA_FILE)
}

pub fn meta_file_name(database: &Path) -> PathBuf {
    database.join(META_FILE)
}

/// `<database>/<index>.<dense|sparse>.idx`
pub fn index_file_name(database: &Path, index: &str, dense: bool) -> PathBuf {
    let kind = if dense { "dense" } else { "sparse" };
    database.join(format!("{}.{}.idx", index, kind))
}

/// `<database>/<map>.map`
pub fn map_file_name(database: &Path, map: &str) -> PathBuf {
    database.join(format!("{}.map", map))
}

/// `<database>/<map>.redb`
pub fn store_file_name(database: &Path, map: &str) -> PathBuf {
    database.join(format!("{}.redb", map))
}
