//! Command-line interface module.

mod args;
pub mod common;
pub mod custom;
pub mod init;
pub mod overrides;
pub mod rebuild;
pub mod serve;
pub mod state;
pub mod status;

pub use args::{Cli, Commands, CustomAction};
