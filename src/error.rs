//! Error types for DFN to ECPM mapping.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, MapDfnError>;

/// The main error type for mapping operations.
///
/// `Configuration` errors are raised before any computation or I/O starts.
/// `Geometry` errors describe a single fracture; the pipeline skips such
/// fractures and counts them instead of aborting.
#[derive(Debug, Error)]
pub enum MapDfnError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Geometry error in fracture {id}: {reason}")]
    Geometry { id: u32, reason: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed field file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
}

impl MapDfnError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn format(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by invalid user input.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = MapDfnError::config("cell size must be positive");
        assert!(e.is_configuration());
        assert_eq!(
            e.to_string(),
            "Configuration error: cell size must be positive"
        );

        let e = MapDfnError::Geometry {
            id: 7,
            reason: "zero aperture".to_string(),
        };
        assert_eq!(e.to_string(), "Geometry error in fracture 7: zero aperture");
        assert!(!e.is_configuration());

        let e = MapDfnError::io(
            "out/porosity.mdfn",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(e.to_string().starts_with("I/O error at out/porosity.mdfn"));
    }
}
