//! Command-line interface - thin operator surface over the library

pub mod commands;
