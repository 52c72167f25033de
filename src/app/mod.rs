//! Application module

pub mod cli;
pub mod commands;
pub mod inputs;
pub mod startup;
