//! The `localchat` command-line client.

pub mod bootstrap;
pub mod cli;
pub mod logging;
