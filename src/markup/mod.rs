//! Panel layout markup: the extracted model and the extractor that builds it.

/// Panel extraction from layout markup.
pub mod extract;
/// Extracted panel descriptors.
pub mod model;
