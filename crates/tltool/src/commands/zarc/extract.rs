use clap::Args;
use miette::Result;
use std::path::PathBuf;
use tl_archive::zarc::{ZArcArchive, ZArcEntry};
use tracing::info;

use crate::commands::{extract_to, run_batch};
use crate::names::{NameDictionary, ZArcNames};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input ZARC file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A path dictionary, one path per line
    #[arg(long, value_name = "FILE")]
    dictionary: Option<PathBuf>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = ZArcArchive::read_from(&self.file)?;

        let mut names = ZArcNames::new(archive.options().path_case);
        if let Some(dictionary) = &self.dictionary {
            names.add_names_from_file(dictionary)?;
        }
        info!("{} entries, {} known paths", archive.len(), names.len());

        let jobs: Vec<(String, &ZArcEntry)> = archive
            .entries()
            .map(|entry| (names.name_or_fallback(entry.hash), entry))
            .collect();

        run_batch("extracted", jobs, |name, entry| {
            extract_to(&self.directory.join(name), &entry.source, self.overwrite)
        })
    }
}
