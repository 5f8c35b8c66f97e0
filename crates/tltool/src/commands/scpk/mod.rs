pub mod pack;
pub mod unpack;

/// Extension of compiled scripts on disk
pub(crate) const SCRIPT_EXTENSION: &str = "LUAC";

#[derive(clap::Subcommand)]
pub enum ScpkCommands {
    /// Pack a directory of .LUAC files into a script pack
    Pack(pack::PackArgs),
    /// Unpack a script pack into .LUAC files
    Unpack(unpack::UnpackArgs),
}

impl ScpkCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ScpkCommands::Pack(pack) => pack.handle(),
            ScpkCommands::Unpack(unpack) => unpack.handle(),
        }
    }
}
