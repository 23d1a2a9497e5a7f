//! Crate-level error types.

use std::fmt;

use crate::gpu::render_context::RenderContextError;

/// Errors produced by the embedview crate.
///
/// Data-loading variants are per-resource: they are reported for the point
/// set or field that failed and leave every other tile and overlay running.
#[derive(Debug)]
pub enum EmbedError {
    /// A point set decoded to zero points, so it has no centroid.
    PointSetEmpty {
        /// Point set that came back empty.
        point_set: String,
    },
    /// A point tuple had an arity other than 2 or 3.
    MalformedPoint {
        /// Zero-based index of the offending tuple.
        index: usize,
        /// Number of coordinates found.
        arity: usize,
    },
    /// A scalar field does not have one value per point.
    FieldLengthMismatch {
        /// Field identifier.
        field: String,
        /// Point count of the point set it was composited against.
        expected: usize,
        /// Number of values in the field.
        actual: usize,
    },
    /// A scalar field payload is not a whole number of `f32` values.
    MalformedField {
        /// Field identifier.
        field: String,
        /// Payload length in bytes.
        byte_len: usize,
    },
    /// Network or storage failure while fetching an external resource.
    Fetch {
        /// Path or URL that was requested.
        resource: String,
        /// Human-readable cause.
        reason: String,
    },
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// Point data was not valid JSON.
    Json(serde_json::Error),
    /// Failed to spawn a background thread.
    ThreadSpawn(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Viewer event-loop failure.
    Viewer(String),
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointSetEmpty { point_set } => {
                write!(f, "point set '{point_set}' contains no points")
            }
            Self::MalformedPoint { index, arity } => write!(
                f,
                "point {index} has {arity} coordinates (expected 2 or 3)"
            ),
            Self::FieldLengthMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "field '{field}' has {actual} values but the point set has \
                 {expected} points"
            ),
            Self::MalformedField { field, byte_len } => write!(
                f,
                "field '{field}' payload of {byte_len} bytes is not a whole \
                 number of f32 values"
            ),
            Self::Fetch { resource, reason } => {
                write!(f, "failed to fetch {resource}: {reason}")
            }
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "point data parse error: {e}"),
            Self::ThreadSpawn(e) => {
                write!(f, "failed to spawn thread: {e}")
            }
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Viewer(msg) => write!(f, "viewer error: {msg}"),
        }
    }
}

impl std::error::Error for EmbedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::Io(e) | Self::ThreadSpawn(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderContextError> for EmbedError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<std::io::Error> for EmbedError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for EmbedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
