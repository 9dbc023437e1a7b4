/// Convenience result type used across panelpress.
pub type PressResult<T> = Result<T, PressError>;

/// Top-level error taxonomy used by conversion APIs.
///
/// `Input` and `Encode` abort a conversion. `Fetch` and `Decode` normally stay inside the
/// compositor as per-panel diagnostics and only surface here when an image is resolved directly.
#[derive(thiserror::Error, Debug)]
pub enum PressError {
    /// Missing or unusable request input (e.g. empty or malformed markup).
    #[error("input error: {0}")]
    Input(String),

    /// Network or status failure while fetching an image.
    #[error("fetch error: {url}: {reason}")]
    Fetch {
        /// Resolution key that was being fetched.
        url: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Bytes were fetched but are not a usable image.
    #[error("decode error: {url}: {reason}")]
    Decode {
        /// Resolution key the bytes came from.
        url: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Raster-to-stream conversion or persistence failure.
    #[error("encode error: {0}")]
    Encode(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PressError {
    /// Build a [`PressError::Input`] value.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Build a [`PressError::Fetch`] value.
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`PressError::Decode`] value.
    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`PressError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Return `true` for errors that abort a whole conversion request.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Fetch { .. } | Self::Decode { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
