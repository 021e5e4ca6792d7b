//! # EODB - Experimental OSM Database
//!
//! EODB stores OSM-style nodes, ways and relations in an append-only log and
//! keeps memory-mappable indexes next to it, so objects can be found by id
//! without a database server.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`osm`] - Entity model, record codec and OPL text format
//! - [`log`] - Append-only object log (`data.osr`)
//! - [`index`] - Dense and sparse position indexes and adjacency multimaps
//! - [`store`] - Ordered external store backend for the multimaps
//! - [`pipeline`] - Import, update, location cache, export and convert
//! - [`tools`] - Lookup, dump and statistics over a finished database
//! - [`output`] - Colored `<id> <value>` output
//! - [`config`] - Run options and `meta.json`
//! - [`utils`] - Memory mapping, byte encoding, paths, progress
//!
//! ## Quick Start
//!
//! ```ignore
//! use eodb::config::Config;
//! use eodb::index::{IndexReader, Offset};
//! use eodb::pipeline::run_import;
//! use std::path::PathBuf;
//!
//! let config = Config::new("planet.eodb");
//! run_import(&config, &[PathBuf::from("planet.opl")]).unwrap();
//!
//! let nodes = IndexReader::<Offset>::open(&config.database, "nodes").unwrap();
//! if let Some(offset) = nodes.get(17).found() {
//!     println!("node 17 is at byte {}", offset);
//! }
//! ```
//!
//! ## Layout
//!
//! A database is a directory holding `data.osr`, one
//! `<kind>.<dense|sparse>.idx` per index, `<relation>.map` or
//! `<relation>.redb` per multimap and `meta.json`.

pub mod config;
pub mod error;
pub mod index;
pub mod log;
pub mod osm;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod tools;
pub mod utils;
