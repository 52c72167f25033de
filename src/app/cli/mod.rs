//! CLI module containing argument parsing and related functionality

pub mod args;
pub mod config;
pub mod display;
