//! Error taxonomy shared by the storage layer and the tools.
//!
//! Not-found is deliberately not an error: lookups return [`Lookup`] and the
//! caller decides how to report a miss.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Process exit codes used by the `eodb` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReturnCode {
    Okay = 0,
    NotFound = 1,
    Error = 2,
    Fatal = 3,
}

impl ReturnCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid option, unknown index type, missing precondition
    #[error("{0}")]
    Config(String),

    #[error("{op} '{}' failed: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File contents violate a format invariant (unsorted sparse file, torn record, ...)
    #[error("corrupt file '{}': {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Append attempted on a structure that has already been sorted
    #[error("{0} is finalized; no further insertions are allowed")]
    Sealed(&'static str),

    #[error("{0}")]
    State(String),

    #[error("identifier 0 is reserved and cannot be stored")]
    InvalidId,

    /// Id beyond what a dense array can address
    #[error("id {id} is too large for a dense index: {reason}")]
    IdTooLarge { id: u64, reason: String },

    /// Entity cannot be represented in the record format
    #[error("invalid {kind} {id}: {reason}")]
    InvalidEntity {
        kind: &'static str,
        id: i64,
        reason: String,
    },

    #[error("object {id} has a different sign than the first object of this run")]
    MixedSigns { id: i64 },

    #[error("external store '{}': {message}", path.display())]
    Store { path: PathBuf, message: String },
}

impl Error {
    pub fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        Error::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn store(path: &Path, err: impl std::fmt::Display) -> Self {
        Error::Store {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Exit code the binary reports when this error terminates a run
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Error::Config(_) | Error::Io { .. } | Error::Store { .. } => ReturnCode::Fatal,
            Error::Corrupt { .. }
            | Error::Sealed(_)
            | Error::State(_)
            | Error::InvalidId
            | Error::IdTooLarge { .. }
            | Error::InvalidEntity { .. }
            | Error::MixedSigns { .. } => ReturnCode::Error,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a point lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Found(V),
    NotFound,
}

impl<V> Lookup<V> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<V> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

impl<V> From<Option<V>> for Lookup<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::NotFound,
        }
    }
}
