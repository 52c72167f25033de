pub mod commands;
pub mod config_file;
pub mod inputs;
