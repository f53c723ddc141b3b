use thiserror::Error;

/// Result type for mesher operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Failures that stop a patch. Iteration and panel caps are not errors; they
/// surface as [`super::UnconvergedReason`] on a partial result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    /// Apex placement exhausted its shrink retries.
    #[error("apex projection failed after {attempts} attempts")]
    OracleProjectionFailure { attempts: usize },

    /// A boundary parameter could not be evaluated on the surface.
    #[error("surface evaluation failed at parameter ({u}, {v})")]
    OracleEvaluationFailure { u: f64, v: f64 },

    /// No loop, a collapsed loop, or too many boundary nodes.
    #[error("malformed boundary: {0}")]
    MalformedBoundary(String),

    #[error("invalid mesh settings: {0}")]
    InvalidSettings(String),
}
