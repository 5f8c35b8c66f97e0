use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::BufReader, path::PathBuf};
use tl_archive::tldat::{TlDatArchive, TlDatEntry};
use tracing::info;

use super::LayoutArgs;
use crate::commands::{extract_to, run_batch};
use crate::names::{NameDictionary, TlDatNames};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input header, usually FILEHEADER.TOFHDB
    #[arg(long, value_name = "FILE")]
    header: PathBuf,

    /// The blob holding the data, usually TLFILE.TLDAT
    #[arg(long, value_name = "FILE")]
    blob: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A name dictionary, one file name per line
    #[arg(long, value_name = "FILE")]
    dictionary: Option<PathBuf>,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.header)
            .into_diagnostic()
            .context(format!("path: {}", &self.header.display()))?;
        let archive = TlDatArchive::read_from(
            &mut BufReader::new(f),
            Some(&self.blob),
            self.layout.options(),
        )?;

        let mut names = TlDatNames::new();
        if let Some(dictionary) = &self.dictionary {
            names.add_names_from_file(dictionary)?;
        }
        info!("{} entries, {} known names", archive.len(), names.len());

        // Entries are grouped into a directory per extension.
        let jobs: Vec<(String, &TlDatEntry)> = archive
            .entries()
            .map(|entry| {
                let extension = entry.extension.to_ascii_uppercase();
                let name = names.name_or_fallback(entry.hash, &extension);
                (format!("{extension}/{name}"), entry)
            })
            .collect();

        run_batch("extracted", jobs, |name, entry| {
            extract_to(&self.directory.join(name), &entry.source, self.overwrite)
        })
    }
}
