pub mod extract;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum ZArcCommands {
    /// Extract a ZARC archive into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into a ZARC archive
    Pack(pack::PackArgs),
}

impl ZArcCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ZArcCommands::Extract(extract) => extract.handle(),
            ZArcCommands::Pack(pack) => pack.handle(),
        }
    }
}
