//! Galley: declarative recipe runner.
//!
//! YAML recipes of bash and agent steps, executed in order against an
//! accumulating context. Agent definitions resolve from prioritized
//! directories. BLAKE3 manifests flag upstream drift in vendored recipes.

pub mod adapters;
pub mod cli;
pub mod core;
pub mod tripwire;
