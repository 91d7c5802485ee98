use thiserror::Error;

/// Error kinds surfaced by the search core.
///
/// Bulk loaders treat `InvalidInput` as a per-record skip; everything else
/// propagates to the caller.
#[derive(Debug, Error)]
pub enum RamGridError {
    /// A k-mer contained a non-ACGT base, a sequence was shorter than `k`,
    /// or a rotation artifact had the wrong shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two databases disagree on `k`, `dims`, or `box_side`.
    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),

    /// Underlying relational failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Malformed JSON on the server socket or a required field missing.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A centroid or contig id that does not exist. Search paths treat this
    /// as an empty result; introspection calls surface it.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RamGridError>;
