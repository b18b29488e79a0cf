//! CLI subcommands.

pub mod common;
pub mod compare;
pub mod config;
pub mod list;
pub mod run;
