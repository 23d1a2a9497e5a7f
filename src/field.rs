//! Per-point scalar fields ("firing-rate maps") and the identifier
//! catalogue that lists them.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::EmbedError;

/// Identifier of a scalar field (a cell id).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// One value per point, index-aligned with a point set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    id: FieldId,
    values: Vec<f32>,
}

impl ScalarField {
    /// Wrap already-decoded values.
    #[must_use]
    pub fn new(id: FieldId, values: Vec<f32>) -> Self {
        Self { id, values }
    }

    /// Decode a flat little-endian `f32` payload.
    ///
    /// # Errors
    ///
    /// [`EmbedError::MalformedField`] if the byte length is not a multiple
    /// of four.
    pub fn from_le_bytes(
        id: FieldId,
        bytes: &[u8],
    ) -> Result<Self, EmbedError> {
        let chunks = bytes.chunks_exact(4);
        if !chunks.remainder().is_empty() {
            return Err(EmbedError::MalformedField {
                field: id.to_string(),
                byte_len: bytes.len(),
            });
        }
        let values = chunks
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { id, values })
    }

    /// Field identifier.
    #[must_use]
    pub fn id(&self) -> &FieldId {
        &self.id
    }

    /// Per-point values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the field holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check the field lines up with a point set of `point_count` points.
    ///
    /// # Errors
    ///
    /// [`EmbedError::FieldLengthMismatch`] when the lengths differ.
    pub fn check_aligned(&self, point_count: usize) -> Result<(), EmbedError> {
        if self.values.len() == point_count {
            Ok(())
        } else {
            Err(EmbedError::FieldLengthMismatch {
                field: self.id.to_string(),
                expected: point_count,
                actual: self.values.len(),
            })
        }
    }
}

/// Fields loaded for the currently active selection.
///
/// Entries live only while their identifier is active; deactivation evicts,
/// so reactivating always re-fetches.
#[derive(Debug, Default)]
pub struct FieldCache {
    fields: FxHashMap<FieldId, ScalarField>,
}

impl FieldCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a loaded field.
    pub fn insert(&mut self, field: ScalarField) {
        drop(self.fields.insert(field.id().clone(), field));
    }

    /// Loaded field for `id`.
    #[must_use]
    pub fn get(&self, id: &FieldId) -> Option<&ScalarField> {
        self.fields.get(id)
    }

    /// Whether `id` has finished loading.
    #[must_use]
    pub fn contains(&self, id: &FieldId) -> bool {
        self.fields.contains_key(id)
    }

    /// Drop the field for `id`.
    pub fn evict(&mut self, id: &FieldId) {
        drop(self.fields.remove(id));
    }

    /// Number of loaded fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parse a newline-delimited identifier list. Lines are trimmed; blank lines
/// are skipped.
#[must_use]
pub fn parse_catalogue(text: &str) -> Vec<FieldId> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(FieldId::from)
        .collect()
}
