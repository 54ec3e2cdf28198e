//! Error types for the cover editor

use thiserror::Error;

/// Result type alias for editor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while editing, persisting, or rendering a cover
#[derive(Error, Debug)]
pub enum Error {
    /// User input was rejected before any state was touched
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The backing store refused a write because it ran out of room.
    ///
    /// Kept distinct from [`Error::Storage`] so callers can evict and retry.
    #[error("Storage quota exceeded writing '{key}' ({needed} bytes, {available} available)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    /// Any other persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A referenced resource is no longer present in the store
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// No usable target surface for the render
    #[error("Rendering unavailable: {0}")]
    RenderUnavailable(String),

    /// Image or font bytes could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the storage failure that triggers template eviction.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Error::QuotaExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_error_is_distinguishable() {
        let e = Error::QuotaExceeded {
            key: "templates".into(),
            needed: 10,
            available: 4,
        };
        assert!(e.is_quota_exceeded());
        assert!(!Error::Storage("disk".into()).is_quota_exceeded());
        assert!(e.to_string().contains("templates"));
    }
}
