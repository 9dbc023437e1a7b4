//! Image loading: transports, decoding, and the request-scoped resolver/cache.

/// Image and data-URL decoding.
pub mod decode;
/// Single-hop GET transports.
pub mod fetch;
/// Resolution keys and the image cache.
pub mod resolve;
