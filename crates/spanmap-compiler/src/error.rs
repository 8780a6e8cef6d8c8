use std::fmt;
use std::path::PathBuf;

/// Result type for spanmap-compiler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during bundle compilation
#[derive(Debug)]
pub enum Error {
    /// Required configuration file or directory absent
    ConfigNotFound(PathBuf),

    /// Schema, type, or value violation in a configuration document
    InvalidConfig(String),

    /// Compiled bundle failed post-compilation checks
    Bundle(String),

    /// IO operation failed
    Io(std::io::Error),

    /// YAML parsing failed
    Yaml(serde_yaml::Error),

    /// JSON serialization failed
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigNotFound(path) => {
                write!(f, "Required configuration not found: {}", path.display())
            }
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Bundle(msg) => write!(f, "Bundle validation failed: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Yaml(err) => write!(f, "YAML error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::ConfigNotFound(_) | Error::InvalidConfig(_) | Error::Bundle(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
