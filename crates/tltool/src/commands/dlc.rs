use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs, path::PathBuf};
use tl_archive::crypt::DlcHeader;
use tracing::info;

#[derive(clap::Subcommand)]
pub enum DlcCommands {
    /// Decrypt a DLC header package
    Decrypt(DecryptArgs),
}

impl DlcCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            DlcCommands::Decrypt(decrypt) => decrypt.handle(),
        }
    }
}

#[derive(Args)]
pub struct DecryptArgs {
    /// An input package, usually DLCHEADERPACKAGE.DAT
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Where to write the plain package, the input is replaced when missing
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl DecryptArgs {
    pub fn handle(&self) -> Result<()> {
        let data = fs::read(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;

        let Some(plain) = DlcHeader::decrypt(&data)? else {
            info!("{} is not encrypted", self.file.display());
            return Ok(());
        };

        let output = self.output.as_ref().unwrap_or(&self.file);
        fs::write(output, plain)
            .into_diagnostic()
            .context(format!("writing {}", output.display()))?;
        info!("decrypted {}", output.display());

        Ok(())
    }
}
