//! Error types for the asset system.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur during asset operations.
///
/// Content sources return these from `construct`; the registry records them
/// on the failed asset and never propagates them to readers.
#[derive(Debug)]
pub enum AssetError {
    /// The backing file or entry does not exist.
    NotFound {
        /// The path or identifier that was looked up.
        path: String,
    },

    /// Failed to read asset data from disk.
    Io {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The content source could not decode its data.
    Parse {
        /// Where the data came from.
        origin: String,
        /// Description of the error.
        message: String,
    },

    /// The payload type was never registered with the registry.
    UnregisteredType {
        /// Human-readable type name.
        type_name: &'static str,
    },

    /// An asset with this id already exists.
    DuplicateId {
        /// The conflicting id.
        id: String,
    },

    /// The handle does not resolve to a live asset.
    InvalidHandle {
        /// Description of why the handle is invalid.
        reason: String,
    },

    /// The asset exists but stores a different payload type.
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Type name recorded for the asset.
        actual: &'static str,
    },

    /// Generic error with a message.
    Other {
        /// Error message.
        message: String,
    },
}

impl AssetError {
    /// Shorthand for a [`AssetError::Parse`] error.
    pub fn parse(origin: impl Into<String>, message: impl fmt::Display) -> Self {
        AssetError::Parse {
            origin: origin.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { path } => {
                write!(f, "Asset not found: {}", path)
            }
            AssetError::Io { path, source } => {
                write!(f, "IO error loading '{}': {}", path.display(), source)
            }
            AssetError::Parse { origin, message } => {
                write!(f, "Failed to parse '{}': {}", origin, message)
            }
            AssetError::UnregisteredType { type_name } => {
                write!(f, "Asset type is not registered: {}", type_name)
            }
            AssetError::DuplicateId { id } => {
                write!(f, "Asset id already in use: {}", id)
            }
            AssetError::InvalidHandle { reason } => {
                write!(f, "Invalid asset handle: {}", reason)
            }
            AssetError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, actual)
            }
            AssetError::Other { message } => {
                write!(f, "Asset error: {}", message)
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
