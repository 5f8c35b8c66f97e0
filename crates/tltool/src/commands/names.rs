use clap::{Args, ValueEnum};
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tl_archive::{hash::parse_hash_file_name, zarc::PathCase};
use tracing::debug;

use super::{relative_name, run_batch, walk_files};
use crate::names::{NameDictionary, TlDatNames, ZArcNames};

/// Which hash the names of a dictionary are keyed by
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum HashType {
    /// 32-bit TLDAT name hash
    #[default]
    Tldat,
    /// ZARC path hash, paths kept as they are
    Zarc,
    /// ZARC path hash of lower cased paths
    ZarcLower,
    /// ZARC path hash of upper cased paths
    ZarcUpper,
}

impl HashType {
    fn path_case(self) -> Option<PathCase> {
        match self {
            HashType::Tldat => None,
            HashType::Zarc => Some(PathCase::None),
            HashType::ZarcLower => Some(PathCase::Lower),
            HashType::ZarcUpper => Some(PathCase::Upper),
        }
    }
}

/// Splits `$0000ABCD.DAT` or `0000ABCD.DAT` into its hash and extension.
fn parse_query(query: &str) -> Option<(u64, &str)> {
    let (stem, extension) = query.rsplit_once('.').unwrap_or((query, ""));
    let digits = stem.strip_prefix('$').unwrap_or(stem);
    if digits.is_empty() {
        return None;
    }
    Some((u64::from_str_radix(digits, 16).ok()?, extension))
}

#[derive(Args)]
pub struct UpdateNamesArgs {
    /// A directory of extracted files
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A name dictionary, one name per line
    #[arg(long, value_name = "FILE")]
    dictionary: PathBuf,

    /// Hash the dictionary names are keyed by
    #[arg(long, value_enum, default_value_t = HashType::Tldat)]
    hash_type: HashType,

    /// Allow overwriting files that already carry the resolved name
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl UpdateNamesArgs {
    pub fn handle(&self) -> Result<()> {
        match self.hash_type.path_case() {
            None => self.rename(TlDatNames::new()),
            Some(path_case) => self.rename(ZArcNames::new(path_case)),
        }
    }

    fn rename<D: NameDictionary>(&self, mut names: D) -> Result<()> {
        names.add_names_from_file(&self.dictionary)?;

        let mut jobs = Vec::new();
        for path in walk_files(&self.directory)? {
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !file_name.starts_with('$') {
                continue;
            }
            let Some((_, extension)) = file_name.rsplit_once('.') else {
                continue;
            };
            if extension.is_empty() {
                continue;
            }
            let Some(hash) = parse_hash_file_name(file_name) else {
                debug!("{} is not a hash name", path.display());
                continue;
            };
            let Some(name) = names.resolve(hash, extension) else {
                continue;
            };

            let target = path.parent().unwrap_or(Path::new("")).join(name);
            let label = format!(
                "{} -> {}",
                relative_name(&self.directory, &path)?,
                name
            );
            jobs.push((label, (path, target)));
        }

        run_batch("renamed", jobs, |_, (from, to)| {
            if to.exists() && !self.overwrite {
                return Err(miette!("{} already exists", to.display()));
            }
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }
            fs::rename(&from, &to)
                .into_diagnostic()
                .context(format!("renaming {}", from.display()))
        })
    }
}

#[derive(Args)]
pub struct QueryNamesArgs {
    /// A name dictionary, one name per line
    #[arg(long, value_name = "FILE")]
    dictionary: PathBuf,

    /// Hash the dictionary names are keyed by
    #[arg(long, value_enum, default_value_t = HashType::Tldat)]
    hash_type: HashType,

    /// Hash names such as `$0000ABCD.DAT`, the `$` is optional
    #[arg(required = true)]
    hashes: Vec<String>,
}

impl QueryNamesArgs {
    pub fn handle(&self) -> Result<()> {
        match self.hash_type.path_case() {
            None => self.query(TlDatNames::new()),
            Some(path_case) => self.query(ZArcNames::new(path_case)),
        }
    }

    fn query<D: NameDictionary>(&self, mut names: D) -> Result<()> {
        names.add_names_from_file(&self.dictionary)?;

        for query in &self.hashes {
            match lookup(&names, query, self.hash_type) {
                Some(name) => println!("{query}: {}", name.green()),
                None => println!("{query}: {}", "<unknown>".red()),
            }
        }
        Ok(())
    }
}

/// The name `query` stands for. TLDAT queries need an extension.
fn lookup<'a, D: NameDictionary>(names: &'a D, query: &str, hash_type: HashType) -> Option<&'a str> {
    let (hash, extension) = parse_query(query)?;
    if hash_type == HashType::Tldat && extension.is_empty() {
        return None;
    }
    names.resolve(hash, extension)
}
