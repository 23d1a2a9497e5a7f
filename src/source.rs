//! External data sources and payload decoding.
//!
//! A [`DataSource`] only fetches bytes by relative path. Decoding lives in
//! the free functions below so every backend shares it:
//! - point sets: JSON array of 2- or 3-element number arrays
//! - scalar fields: flat little-endian `f32`
//! - catalogue: newline-delimited identifiers

use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::error::EmbedError;
use crate::field::{parse_catalogue, FieldId, ScalarField};
use crate::point_set::{PointSet, PointSetId};

/// Byte-level access to point, field and catalogue files.
///
/// Implementations are called from the background loader thread.
pub trait DataSource: Send + Sync {
    /// Fetch the resource at `path` (relative to the source root).
    ///
    /// # Errors
    ///
    /// [`EmbedError::Fetch`] when the resource cannot be retrieved.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, EmbedError>;
}

/// Files under a local directory.
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    /// Source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DataSource for FsSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, EmbedError> {
        let full = self.root.join(path);
        std::fs::read(&full).map_err(|e| EmbedError::Fetch {
            resource: full.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Files served over HTTP under a base URL.
#[cfg(feature = "fetch")]
pub struct HttpSource {
    base_url: String,
}

#[cfg(feature = "fetch")]
impl HttpSource {
    /// Source rooted at `base_url` (with or without a trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url }
    }
}

#[cfg(feature = "fetch")]
impl DataSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, EmbedError> {
        let url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        let fail = |reason: String| EmbedError::Fetch {
            resource: url.clone(),
            reason,
        };
        let mut body = ureq::get(&url)
            .call()
            .map_err(|e| fail(e.to_string()))?
            .into_body();
        // Point clouds and rate maps routinely exceed ureq's 10 MiB default.
        body.with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| fail(e.to_string()))
    }
}

/// In-memory files, keyed by path.
#[derive(Default)]
pub struct MemorySource {
    files: FxHashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    #[must_use]
    pub fn with_file(
        mut self,
        path: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        drop(self.files.insert(path.into(), bytes.into()));
        self
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, EmbedError> {
        self.files.get(path).cloned().ok_or_else(|| EmbedError::Fetch {
            resource: path.to_owned(),
            reason: "not found".to_owned(),
        })
    }
}

/// Decode point JSON into a centered point set.
///
/// # Errors
///
/// [`EmbedError::Json`] for invalid JSON, plus the errors of
/// [`PointSet::from_tuples`].
pub fn decode_points(
    id: PointSetId,
    bytes: &[u8],
) -> Result<PointSet, EmbedError> {
    let tuples: Vec<Vec<f32>> = serde_json::from_slice(bytes)?;
    log::info!("loaded {} points for '{id}'", tuples.len());
    let set = PointSet::from_tuples(id, &tuples)?;
    log::debug!("centroid of '{}': {}", set.id(), set.centroid());
    Ok(set)
}

/// Decode a catalogue file. Invalid UTF-8 is replaced, not rejected.
#[must_use]
pub fn decode_catalogue(bytes: &[u8]) -> Vec<FieldId> {
    parse_catalogue(&String::from_utf8_lossy(bytes))
}

/// Fetch and decode a point set.
///
/// # Errors
///
/// Fetch or decode failure.
pub fn load_point_set(
    source: &dyn DataSource,
    id: PointSetId,
    path: &str,
) -> Result<PointSet, EmbedError> {
    let bytes = source.fetch(path)?;
    decode_points(id, &bytes)
}

/// Fetch and decode a scalar field.
///
/// # Errors
///
/// Fetch or decode failure.
pub fn load_scalar_field(
    source: &dyn DataSource,
    id: FieldId,
    path: &str,
) -> Result<ScalarField, EmbedError> {
    let bytes = source.fetch(path)?;
    ScalarField::from_le_bytes(id, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mixed_precision_point_json() {
        let set = decode_points(
            "torus".into(),
            br"[[1, 2, 3], [3.5, 4, 5.0], [2.5, 3, 4]]",
        )
        .unwrap();
        assert_eq!(set.len(), 3);
        assert!((set.centroid().x - 7.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn empty_point_array_is_point_set_empty() {
        let err = decode_points("torus".into(), b"[]").unwrap_err();
        assert!(matches!(err, EmbedError::PointSetEmpty { .. }));
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = decode_points("torus".into(), b"[[1, 2,").unwrap_err();
        assert!(matches!(err, EmbedError::Json(_)));
    }

    #[test]
    fn missing_file_is_a_fetch_failure() {
        let source = MemorySource::new();
        let err = load_scalar_field(&source, "c1".into(), "rates/c1.bin")
            .unwrap_err();
        assert!(matches!(err, EmbedError::Fetch { .. }));

        let fs = FsSource::new("/nonexistent-embedview-root");
        assert!(matches!(
            fs.fetch("points.json"),
            Err(EmbedError::Fetch { .. })
        ));
    }

    #[test]
    fn memory_source_serves_fields() {
        let bytes: Vec<u8> =
            [0.25f32, 0.75].iter().flat_map(|v| v.to_le_bytes()).collect();
        let source = MemorySource::new().with_file("rates/c1.bin", bytes);
        let field =
            load_scalar_field(&source, "c1".into(), "rates/c1.bin").unwrap();
        assert_eq!(field.values(), &[0.25, 0.75]);
    }

    #[test]
    fn catalogue_tolerates_crlf() {
        assert_eq!(
            decode_catalogue(b"c1\r\n\r\nc2\r\n"),
            vec![FieldId::from("c1"), FieldId::from("c2")]
        );
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn http_source_reads_bodies_past_ten_mib() {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        const LEN: usize = 12 * 1024 * 1024;
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {LEN}\r\n\
                 Connection: close\r\n\r\n"
            )
            .unwrap();
            stream.write_all(&vec![7u8; LEN]).unwrap();
        });

        let source = HttpSource::new(format!("http://{addr}"));
        let bytes = source.fetch("rates/c1.bin").unwrap();
        assert_eq!(bytes.len(), LEN);
        assert!(bytes.iter().all(|&b| b == 7));
        server.join().unwrap();
    }
}
