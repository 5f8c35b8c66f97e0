//! Command line front end for [`tl_archive`].

pub mod commands;
pub mod names;
