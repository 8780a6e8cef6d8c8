use std::fmt;
use std::path::PathBuf;

/// Result type for spanmap-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime engine layer
#[derive(Debug)]
pub enum Error {
    /// Bundle file missing at the configured path
    BundleNotFound(PathBuf),

    /// Structural integrity failure after deserialization
    BundleCorrupt(String),

    /// IO operation failed
    Io(std::io::Error),

    /// JSON deserialization failed
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BundleNotFound(path) => {
                write!(f, "Compiled bundle not found: {}", path.display())
            }
            Error::BundleCorrupt(msg) => write!(f, "Bundle corrupt: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::BundleNotFound(_) | Error::BundleCorrupt(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
