//! Application layer: configuration, terminal setup, exit codes and the
//! run pipeline.

pub(crate) mod config_file;
pub(crate) mod config_manager;
pub(crate) mod exit_handler;
pub(crate) mod runtime;
pub(crate) mod terminal;
