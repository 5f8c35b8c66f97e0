use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::BufReader, path::PathBuf};
use tl_archive::scpk::{ScriptEntry, ScriptPack};
use tracing::info;

use super::SCRIPT_EXTENSION;
use crate::commands::{extract_to, run_batch};

#[derive(Args)]
pub struct UnpackArgs {
    /// An input script pack
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl UnpackArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let pack = ScriptPack::read(&mut BufReader::new(f))?;

        let options = pack.options();
        info!(
            "{} scripts, {:?}, {}",
            pack.len(),
            options.endian,
            if options.ignore_case {
                "case insensitive"
            } else {
                "case sensitive"
            }
        );

        let jobs: Vec<(String, &ScriptEntry)> = pack
            .entries()
            .map(|script| (format!("{}.{SCRIPT_EXTENSION}", script.name), script))
            .collect();

        run_batch("unpacked", jobs, |name, script| {
            extract_to(&self.directory.join(name), &script.source, self.overwrite)
        })
    }
}
