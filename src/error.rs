//! Error types shared by every module of the crate.
use thiserror::Error;

/// Everything that can go wrong while filling, merging, slicing or evaluating histograms.
#[derive(Error, Debug)]
pub enum Error {
    /// Two objects that should share a schema do not, or a schema is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A vector or matrix has a length that disagrees with the declared WC basis or batch size.
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Which quantity had the wrong shape.
        what: String,
        /// The length implied by the schema.
        expected: usize,
        /// The length that was supplied.
        actual: usize,
    },

    /// Integrating out the application-region axis left no signal-region identifier.
    #[error("histogram '{0}' does not have any signal region")]
    MissingSignalRegion(String),

    /// An identifier was requested that the categorical axis has never seen.
    #[error("identifier '{identifier}' not present on axis '{axis}'")]
    UnknownIdentifier {
        /// Name of the categorical axis.
        axis: String,
        /// The identifier that was asked for.
        identifier: String,
    },

    /// A fill request did not provide a value for a declared axis.
    #[error("no value given for axis '{0}'")]
    MissingAxisValue(String),

    /// The propagated variance came out negative, which hints at numerical cancellation.
    #[error("negative variance {0}")]
    NegativeVariance(f64),

    /// Serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn shape(what: &str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.to_string(),
            expected,
            actual,
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
