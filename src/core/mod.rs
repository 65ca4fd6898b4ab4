//! Core engine: types, parsing, templating, resolution, discovery, execution.

pub mod condition;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod parser;
pub mod resolver;
pub mod runner;
pub mod types;
