//! Read-only memory mapping of a whole file.

use crate::error::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A file mapped read-only into memory
///
/// The mapping and the descriptor live exactly as long as this value. `close`
/// releases both and reports failures; dropping releases them silently.
pub struct MappedFile {
    path: PathBuf,
    file: Option<File>,
    /// `None` for empty files, which cannot be mapped
    mmap: Option<Mmap>,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io("Opening input file", path, e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::io("Getting length of input file", path, e))?
            .len();

        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: the database has a single writer; readers only open
            // files after the writer has flushed them.
            let map = unsafe { Mmap::map(&file) }
                .map_err(|e| Error::io("Mapping of input file", path, e))?;
            Some(map)
        };

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            mmap,
        })
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unmap, then close the descriptor
    pub fn close(mut self) -> Result<()> {
        self.mmap = None;
        match self.file.take() {
            Some(file) => close_file(file, &self.path),
            None => Ok(()),
        }
    }
}

#[cfg(unix)]
fn close_file(file: File, path: &Path) -> Result<()> {
    use std::os::fd::IntoRawFd;

    let fd = file.into_raw_fd();
    // SAFETY: `fd` was just released by `into_raw_fd` and is closed exactly once.
    if unsafe { libc::close(fd) } != 0 {
        return Err(Error::io(
            "Closing of input file",
            path,
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn close_file(file: File, _path: &Path) -> Result<()> {
    drop(file);
    Ok(())
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_map_and_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"hello mapped world").unwrap();

        let mf = MappedFile::open(&path).unwrap();
        assert_eq!(mf.len(), 18);
        assert_eq!(&mf.data()[..5], b"hello");
        mf.close().unwrap();
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        let mf = MappedFile::open(&path).unwrap();
        assert!(mf.is_empty());
        assert_eq!(mf.data(), &[] as &[u8]);
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.idx");
        let err = MappedFile::open(&path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing.idx"), "{}", msg);
        assert!(msg.starts_with("Opening input file"));
    }
}
