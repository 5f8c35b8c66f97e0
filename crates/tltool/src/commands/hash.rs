use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;
use tl_archive::{
    hash::{name_hash32_str, zarc_hash64, HashOptions},
    zarc::PathCase,
};

use super::PathCaseArg;

#[derive(Args)]
pub struct HashArgs {
    /// Names or paths to hash
    #[arg(required = true)]
    names: Vec<String>,

    /// Hash names case sensitively
    #[arg(long, default_value_t = false)]
    case_sensitive: bool,

    /// Case folding applied to paths before the ZARC hash
    #[arg(long, value_enum, default_value_t = PathCaseArg::Lower)]
    path_case: PathCaseArg,
}

impl HashArgs {
    pub fn handle(&self) -> Result<()> {
        let options = if self.case_sensitive {
            HashOptions::NONE
        } else {
            HashOptions::IGNORE_CASE
        };
        let path_case = PathCase::from(self.path_case);

        for name in &self.names {
            let name32 = name_hash32_str(name, options);
            let zarc64 = zarc_hash64(path_case.apply(name).as_bytes());
            println!("{}  {name32:08X}  {zarc64:016X}", name.bold());
        }
        Ok(())
    }
}
