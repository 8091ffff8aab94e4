//! Library half of the `vq` binary, split out so commands can be tested
//! in-process.

pub mod cli;
pub mod commands;
pub mod config;
