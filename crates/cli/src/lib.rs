//! Partikle runtime launcher.
//!
//! Turns the process argument vector into [`scan::LaunchOptions`] plus a
//! cursor, renders `--help` from the command tree in [`commands`], and hands
//! the result to a [`launch::Runtime`].

pub mod commands;
pub mod config;
pub mod launch;
pub mod lifecycle;
pub mod scan;
