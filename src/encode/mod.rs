//! Encoding and persistence of finished surfaces.

/// Streaming PNG encoding.
pub mod png;
/// Directory-backed output storage.
pub mod store;
