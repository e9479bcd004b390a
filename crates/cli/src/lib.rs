//! Shared pieces of the `surf` command line client

pub mod config;
pub mod util;
