//! ZARC archives.
//!
//! A single big endian file: a header, one content record per entry, a block size table shared by
//! every entry and then the entry data. Paths are not stored, entries are keyed by the
//! [`zarc_hash64`] of their path after the archive's [`PathCase`] folding.

mod read;
pub mod types;
mod write;

use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{EntryNotFoundError, Error, Result};
use crate::hash::zarc_hash64;
use crate::source::DataSource;

pub use types::{PathCase, PathEncoding, ZArcOptions};

/// Block alignments of 0 and 1 leave the block count of an entry undefined.
pub(crate) fn check_block_alignment(alignment: u32) -> Result<()> {
    match alignment {
        0 | 1 => Err(Error::UnsupportedBlockAlignment(alignment)),
        _ => Ok(()),
    }
}

/// An entry of a ZARC archive
#[derive(Debug, Clone, PartialEq)]
pub struct ZArcEntry {
    /// Hash of the entry's path
    pub hash: u64,

    /// The entry's data
    pub source: DataSource,
}

impl ZArcEntry {
    /// Creates an entry from its parts.
    pub fn new(hash: u64, source: DataSource) -> Self {
        Self { hash, source }
    }
}

/// A ZARC archive
///
/// ```no_run
/// use std::path::Path;
/// use tl_archive::zarc::ZArcArchive;
///
/// fn show(path: &Path) -> tl_archive::error::Result<()> {
///     let archive = ZArcArchive::read_from(path)?;
///     let entry = archive.by_path("data/chr/chr0001.hac")?;
///     println!("{} bytes", entry.source.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZArcArchive {
    entries: IndexMap<u64, ZArcEntry>,
    options: ZArcOptions,
}

impl ZArcArchive {
    /// An empty archive
    pub fn new(options: ZArcOptions) -> Self {
        Self {
            entries: IndexMap::new(),
            options,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = &ZArcEntry> {
        self.entries.values()
    }

    /// Layout options, as read or as used when writing
    pub fn options(&self) -> ZArcOptions {
        self.options
    }

    /// Replaces the layout options used when writing.
    pub fn set_options(&mut self, options: ZArcOptions) {
        self.options = options;
    }

    /// Hash of `path` after this archive's case folding.
    pub fn hash_path(&self, path: &str) -> u64 {
        zarc_hash64(self.options.path_case.apply(path).as_bytes())
    }

    /// Adds an entry, failing if its hash is already present.
    pub fn add_entry(&mut self, entry: ZArcEntry) -> Result<()> {
        if self.entries.contains_key(&entry.hash) {
            return Err(Error::DuplicateHash(entry.hash));
        }
        self.entries.insert(entry.hash, entry);
        Ok(())
    }

    /// Adds an entry, replacing one with the same hash in place. Returns the replaced entry.
    pub fn add_or_update_entry(&mut self, entry: ZArcEntry) -> Option<ZArcEntry> {
        let replaced = self.entries.insert(entry.hash, entry);
        if let Some(old) = &replaced {
            debug!("replaced entry {:016X}", old.hash);
        }
        replaced
    }

    /// Adds the file at `path` under the archive path `name`.
    pub fn add_file(&mut self, name: &str, path: &Path) -> Result<()> {
        let hash = self.hash_path(name);
        self.add_entry(ZArcEntry::new(hash, DataSource::from_path(path)?))
    }

    /// The entry with `hash`
    pub fn try_get_entry(&self, hash: u64) -> Option<&ZArcEntry> {
        self.entries.get(&hash)
    }

    /// The entry stored under `path`
    pub fn try_get_entry_by_path(&self, path: &str) -> Option<&ZArcEntry> {
        self.try_get_entry(self.hash_path(path))
    }

    /// Search for an entry by hash
    pub fn by_hash(&self, hash: u64) -> Result<&ZArcEntry> {
        self.try_get_entry(hash)
            .ok_or(Error::EntryNotFound(EntryNotFoundError::Hash(hash)))
    }

    /// Search for an entry by path
    pub fn by_path(&self, path: &str) -> Result<&ZArcEntry> {
        self.try_get_entry_by_path(path)
            .ok_or_else(|| Error::EntryNotFound(EntryNotFoundError::Name(path.to_owned())))
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
