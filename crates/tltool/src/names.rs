//! Name dictionaries.
//!
//! Containers only store hashes, so names are recovered by hashing candidate names read from a
//! plain text file, one per line. Hashes without a known name get a `$`-prefixed fallback name
//! that [`tl_archive::hash::parse_hash_file_name`] turns back into the hash when repacking.

use std::{
    collections::{hash_map::Entry, HashMap},
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use miette::{Context, IntoDiagnostic, Result};
use tl_archive::{
    hash::{name_hash32_str, zarc_hash64, HashOptions},
    zarc::PathCase,
};
use tracing::debug;

/// A set of known names, keyed the way a container keys its entries
pub trait NameDictionary {
    /// Adds `name`. Returns false when it is a placeholder, unusable, or its key is taken.
    fn try_add(&mut self, name: &str) -> bool;

    /// The name stored for `hash`. Extensions only matter to dictionaries that key on them.
    fn resolve(&self, hash: u64, extension: &str) -> Option<&str>;

    /// Adds every non-empty line of `reader`. Returns how many names were added.
    fn add_names<R: BufRead>(&mut self, reader: R) -> io::Result<usize> {
        let mut added = 0;
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if self.try_add(&line) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Adds the names listed in the file at `path`.
    fn add_names_from_file(&mut self, path: &Path) -> Result<usize> {
        let file = File::open(path)
            .into_diagnostic()
            .context(format!("opening {}", path.display()))?;
        let added = self
            .add_names(BufReader::new(file))
            .into_diagnostic()
            .context(format!("reading {}", path.display()))?;
        debug!("{added} names from {}", path.display());
        Ok(added)
    }
}

/// Names of TLDAT entries, keyed by hash and extension
#[derive(Debug, Default)]
pub struct TlDatNames {
    names: HashMap<(u32, String), String>,
}

impl TlDatNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// The known name for `hash` with `extension`
    pub fn get(&self, hash: u32, extension: &str) -> Option<&str> {
        self.names
            .get(&(hash, extension.to_ascii_uppercase()))
            .map(String::as_str)
    }

    /// The known name, or `$XXXXXXXX.EXT`.
    pub fn name_or_fallback(&self, hash: u32, extension: &str) -> String {
        let extension = extension.to_ascii_uppercase();
        match self.names.get(&(hash, extension.clone())) {
            Some(name) => name.clone(),
            None => format!("${hash:08X}.{extension}"),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl NameDictionary for TlDatNames {
    fn try_add(&mut self, name: &str) -> bool {
        let name = name.to_ascii_uppercase();
        if name.starts_with('$') {
            return false;
        }

        let extension = match name.rfind('.') {
            Some(dot) if dot + 1 < name.len() => name[dot + 1..].to_owned(),
            _ => return false,
        };

        let hash = name_hash32_str(&name, HashOptions::IGNORE_CASE);
        match self.names.entry((hash, extension)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(name);
                true
            }
        }
    }

    fn resolve(&self, hash: u64, extension: &str) -> Option<&str> {
        self.get(u32::try_from(hash).ok()?, extension)
    }
}

/// Paths of ZARC entries, keyed by hash after the archive's case folding
#[derive(Debug)]
pub struct ZArcNames {
    path_case: PathCase,
    names: HashMap<u64, String>,
}

impl ZArcNames {
    pub fn new(path_case: PathCase) -> Self {
        Self {
            path_case,
            names: HashMap::new(),
        }
    }

    pub fn get(&self, hash: u64) -> Option<&str> {
        self.names.get(&hash).map(String::as_str)
    }

    /// The known path, or `$XXXXXXXXXXXXXXXX.bin`.
    pub fn name_or_fallback(&self, hash: u64) -> String {
        match self.names.get(&hash) {
            Some(name) => name.clone(),
            None => format!("${hash:016X}.bin"),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl NameDictionary for ZArcNames {
    fn try_add(&mut self, name: &str) -> bool {
        let name = self.path_case.apply(name);
        if name.starts_with('$') {
            return false;
        }

        match self.names.entry(zarc_hash64(name.as_bytes())) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(name);
                true
            }
        }
    }

    fn resolve(&self, hash: u64, _extension: &str) -> Option<&str> {
        self.get(hash)
    }
}
