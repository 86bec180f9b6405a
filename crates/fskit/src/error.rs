//! Error types for fskit.

use thiserror::Error;

/// Result type alias using fskit's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// fskit error types.
///
/// Path construction failures are split into their own variants so callers
/// can distinguish "you handed me garbage" from "the file is not there".
/// Object-store failures are wrapped in [`Error::Store`] at the client
/// boundary; existence-shaped queries swallow them and report absence
/// instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Path input was empty.
    #[error("empty path")]
    PathEmpty,

    /// Path is malformed (for example, not absolute).
    #[error("invalid path: {0}")]
    PathInvalid(String),

    /// Path contains `.` or `..` segments.
    #[error("path contains dotted segments: {0}")]
    PathDottedSegments(String),

    /// Path contains characters that are not valid in file names.
    #[error("invalid characters in path: {0}")]
    PathInvalidChars(String),

    /// A required file or directory is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A mutating operation was attempted on a read-only filesystem.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// A resolved host path escapes the configured root.
    #[error("path escapes filesystem root: {0}")]
    Forbidden(String),

    /// The operation is not supported by this stream or filesystem.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// A write-limited stream ran out of budget.
    #[error("write limit of {limit} bytes exceeded")]
    WriteLimitExceeded {
        /// The configured byte cap.
        limit: u64,
    },

    /// I/O error from the host filesystem.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by an object-store client.
    #[error("object store error: {0}")]
    Store(String),
}

impl Error {
    /// Error for a missing file or directory.
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Error for a malformed path.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Error::PathInvalid(path.into())
    }

    /// Error for a host path escaping its root.
    pub fn forbidden(path: impl Into<String>) -> Self {
        Error::Forbidden(path.into())
    }

    /// Error for an object-store failure.
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Error for removing a non-empty directory without `recursive`.
    pub fn directory_not_empty() -> Self {
        std::io::Error::other("directory not empty").into()
    }

    /// True if this error reports absence rather than failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
            || matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = Error::not_found("/a/b.txt");
        assert!(err.to_string().contains("/a/b.txt"));

        let err = Error::WriteLimitExceeded { limit: 3 };
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn io_not_found_is_not_found() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(err.is_not_found());
        assert!(Error::not_found("x").is_not_found());
        assert!(!Error::ReadOnly.is_not_found());
    }
}
