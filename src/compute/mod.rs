//! Compute layer for query processing.
//!
//! Everything here is independent of where the data lives: geometry
//! decoding and refinement, code pattern parsing, population folds and
//! input validation. Backends and the engine both build on it.

pub mod geometry;
pub mod pattern;
pub mod population;
pub mod validation;
