//! CLI layer

pub mod args;
pub mod commands;
