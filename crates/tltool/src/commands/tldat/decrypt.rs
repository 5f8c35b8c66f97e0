use clap::Args;
use memmap2::MmapOptions;
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs::{self, OpenOptions},
    io::Cursor,
    path::PathBuf,
};
use tl_archive::{
    crypt::EncryptHeader,
    tldat::{decrypt_blob, decrypt_header, TlDatArchive, TlDatOptions},
};
use tracing::info;

#[derive(Args)]
pub struct DecryptArgs {
    /// The key material, usually FILEHEADER.TOFHDA
    #[arg(long, value_name = "FILE")]
    keys: PathBuf,

    /// The encrypted header, usually FILEHEADER.TOFHDB
    #[arg(long, value_name = "FILE")]
    header: PathBuf,

    /// The encrypted blob, usually TLFILE.TLDAT
    #[arg(long, value_name = "FILE")]
    blob: PathBuf,
}

impl DecryptArgs {
    pub fn handle(&self) -> Result<()> {
        let keys = EncryptHeader::new(
            fs::read(&self.keys)
                .into_diagnostic()
                .context(format!("path: {}", &self.keys.display()))?,
        );

        let mut header = fs::read(&self.header)
            .into_diagnostic()
            .context(format!("path: {}", &self.header.display()))?;
        decrypt_header(&keys, &mut header)?;

        // Encrypted releases always use 64-bit little endian headers.
        let archive = TlDatArchive::read_from(
            &mut Cursor::new(&header),
            None,
            TlDatOptions::default(),
        )?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.blob)
            .into_diagnostic()
            .context(format!("opening {}", self.blob.display()))?;

        // SAFETY: the blob must not be modified by another process while it is mapped.
        #[allow(unsafe_code)]
        let mut blob = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .into_diagnostic()
                .context(format!("mapping {}", self.blob.display()))?
        };

        let decrypted = decrypt_blob(&archive, &keys, &mut blob)?;
        blob.flush().into_diagnostic()?;
        info!("decrypted {decrypted} of {} entries", archive.len());

        // Only written once the blob is done, so a failure leaves both files encrypted.
        fs::write(&self.header, &header)
            .into_diagnostic()
            .context(format!("writing {}", self.header.display()))?;
        info!("decrypted {}", self.header.display());

        Ok(())
    }
}
