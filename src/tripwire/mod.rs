//! Tripwire: BLAKE3 content hashing and upstream drift manifests.

pub mod drift;
pub mod hasher;
