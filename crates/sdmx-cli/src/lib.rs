//! Command-line front end for the SDMX presentation engine.
//!
//! [`session::Session`] opens the service (remote or a fixture) and its
//! metadata once; [`commands`] runs one subcommand against it and
//! [`output`] renders the result.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;
pub mod session;
