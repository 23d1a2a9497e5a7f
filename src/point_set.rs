//! Centered point clouds and their static base coloring.
//!
//! A [`PointSet`] is built once from raw tuples: the centroid is computed,
//! subtracted from every position, and the result is frozen. Reloading
//! replaces the whole set.
//!
//! [`PointSetStore`] tracks every point set a session knows about, along with
//! the default color buffer derived from its [`DefaultColoring`] rule. Rules
//! that read another point set's coordinates stay parked until that producer
//! has finished loading.

use std::fmt;

use glam::{DVec3, Vec3};
use rustc_hash::FxHashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::colormap::Colormap;
use crate::compositor::ColorBuffer;
use crate::error::EmbedError;

/// Identifier of a point set (one per tile / data source).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct PointSetId(String);

impl PointSetId {
    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PointSetId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Coordinate axis used to drive the base coloring.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Centered X coordinate.
    X,
    /// Centered Y coordinate.
    #[default]
    Y,
    /// Centered Z coordinate.
    Z,
}

impl Axis {
    fn pick(self, v: Vec3) -> f32 {
        match self {
            Self::X => v.x,
            Self::Y => v.y,
            Self::Z => v.z,
        }
    }
}

/// Rule producing a point set's static per-point colors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefaultColoring {
    /// Diverging colormap over one of this set's own centered coordinates.
    Axis {
        /// Coordinate to read.
        axis: Axis,
        /// Value mapped to the low end of the ramp.
        lo: f32,
        /// Value mapped to the high end of the ramp.
        hi: f32,
    },
    /// Diverging colormap over another point set's centered coordinate,
    /// index-aligned with this one (e.g. a 2D projection colored like its
    /// 3D source).
    FromPointSet {
        /// Producer point set.
        source: PointSetId,
        /// Coordinate to read from the producer.
        axis: Axis,
        /// Value mapped to the low end of the ramp.
        lo: f32,
        /// Value mapped to the high end of the ramp.
        hi: f32,
    },
}

impl Default for DefaultColoring {
    fn default() -> Self {
        Self::Axis {
            axis: Axis::Y,
            lo: -4.0,
            hi: 4.0,
        }
    }
}

/// An immutable, centroid-centered point cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    id: PointSetId,
    positions: Vec<Vec3>,
    centroid: Vec3,
}

impl PointSet {
    /// Center `raw` on its arithmetic mean.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::PointSetEmpty`] when `raw` has no points.
    pub fn from_raw(id: PointSetId, raw: &[Vec3]) -> Result<Self, EmbedError> {
        if raw.is_empty() {
            return Err(EmbedError::PointSetEmpty {
                point_set: id.to_string(),
            });
        }

        // Accumulate in f64 so large clouds far from the origin still
        // center to ~0.
        let sum = raw
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + p.as_dvec3());
        let mean = sum / raw.len() as f64;

        let positions = raw
            .iter()
            .map(|p| (p.as_dvec3() - mean).as_vec3())
            .collect();

        Ok(Self {
            id,
            positions,
            centroid: mean.as_vec3(),
        })
    }

    /// Build from 2- or 3-tuples as found in point JSON. 2D tuples get
    /// `z = 0`.
    ///
    /// # Errors
    ///
    /// [`EmbedError::MalformedPoint`] for any tuple that is not 2 or 3 long,
    /// [`EmbedError::PointSetEmpty`] for an empty list.
    pub fn from_tuples(
        id: PointSetId,
        tuples: &[Vec<f32>],
    ) -> Result<Self, EmbedError> {
        let raw = tuples
            .iter()
            .enumerate()
            .map(|(index, t)| match t.as_slice() {
                [x, y] => Ok(Vec3::new(*x, *y, 0.0)),
                [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
                _ => Err(EmbedError::MalformedPoint {
                    index,
                    arity: t.len(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_raw(id, &raw)
    }

    /// Point set identifier.
    #[must_use]
    pub fn id(&self) -> &PointSetId {
        &self.id
    }

    /// Centered positions.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Mean of the raw positions, as subtracted at load.
    #[must_use]
    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    /// Number of points (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always `false`; empty sets are rejected at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Diverging colors over one centered coordinate.
    #[must_use]
    pub fn axis_colors(&self, axis: Axis, lo: f32, hi: f32) -> ColorBuffer {
        let cmap = Colormap::Diverging { lo, hi };
        self.positions
            .iter()
            .map(|&p| cmap.evaluate(axis.pick(p)))
            .collect()
    }
}

/// Load state of one point set slot in the store.
#[derive(Debug)]
pub enum PointSetState {
    /// Requested but not yet delivered.
    Pending,
    /// Loaded; default colors may still be waiting on a producer.
    Ready {
        /// The centered point set.
        set: PointSet,
        /// Static colors, once the coloring rule could be resolved.
        default_colors: Option<ColorBuffer>,
    },
    /// Load failed; the tile is skipped until the set is reloaded.
    Failed(String),
}

struct Entry {
    coloring: DefaultColoring,
    state: PointSetState,
}

/// Every point set of a session, keyed by id.
#[derive(Default)]
pub struct PointSetStore {
    entries: FxHashMap<PointSetId, Entry>,
}

impl PointSetStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a point set that is about to be loaded.
    pub fn register(&mut self, id: PointSetId, coloring: DefaultColoring) {
        drop(self.entries.insert(
            id,
            Entry {
                coloring,
                state: PointSetState::Pending,
            },
        ));
    }

    /// Store a freshly loaded set, replacing any previous one.
    ///
    /// Returns every point set whose default colors became available as a
    /// result, including dependents that were waiting on this one.
    pub fn insert(&mut self, set: PointSet) -> Vec<PointSetId> {
        let id = set.id().clone();
        let entry = self.entries.entry(id.clone()).or_insert_with(|| Entry {
            coloring: DefaultColoring::default(),
            state: PointSetState::Pending,
        });
        entry.state = PointSetState::Ready {
            set,
            default_colors: None,
        };
        log::info!("point set '{id}' ready");

        // A reloaded producer invalidates colors derived from it.
        for entry in self.entries.values_mut() {
            if let (
                DefaultColoring::FromPointSet { source, .. },
                PointSetState::Ready { default_colors, .. },
            ) = (&entry.coloring, &mut entry.state)
            {
                if *source == id {
                    *default_colors = None;
                }
            }
        }
        self.resolve_default_colors()
    }

    /// Record a failed load.
    ///
    /// Returns dependents whose default colors could now be resolved by
    /// falling back to their own coordinates.
    pub fn mark_failed(
        &mut self,
        id: &PointSetId,
        reason: String,
    ) -> Vec<PointSetId> {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.state = PointSetState::Failed(reason);
        }
        self.resolve_default_colors()
    }

    /// Current state of a point set.
    #[must_use]
    pub fn state(&self, id: &PointSetId) -> Option<&PointSetState> {
        self.entries.get(id).map(|e| &e.state)
    }

    /// Loaded point set, if any.
    #[must_use]
    pub fn get(&self, id: &PointSetId) -> Option<&PointSet> {
        match self.state(id)? {
            PointSetState::Ready { set, .. } => Some(set),
            _ => None,
        }
    }

    /// Default colors, once both the set and its coloring producer loaded.
    #[must_use]
    pub fn default_colors(&self, id: &PointSetId) -> Option<&ColorBuffer> {
        match self.state(id)? {
            PointSetState::Ready { default_colors, .. } => {
                default_colors.as_ref()
            }
            _ => None,
        }
    }

    /// Ids of every registered point set, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<PointSetId> {
        let mut ids: Vec<PointSetId> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Fill in default colors for every ready set whose rule can now be
    /// evaluated. Returns the ids that changed.
    fn resolve_default_colors(&mut self) -> Vec<PointSetId> {
        let mut resolved = Vec::new();
        let mut computed: Vec<(PointSetId, ColorBuffer)> = Vec::new();

        for (id, entry) in &self.entries {
            let PointSetState::Ready {
                set,
                default_colors: None,
            } = &entry.state
            else {
                continue;
            };
            let colors = match &entry.coloring {
                DefaultColoring::Axis { axis, lo, hi } => {
                    Some(set.axis_colors(*axis, *lo, *hi))
                }
                DefaultColoring::FromPointSet {
                    source,
                    axis,
                    lo,
                    hi,
                } => self.colors_from_source(set, source, *axis, *lo, *hi),
            };
            if let Some(colors) = colors {
                computed.push((id.clone(), colors));
            }
        }

        for (id, colors) in computed {
            if let Some(Entry {
                state:
                    PointSetState::Ready {
                        default_colors: slot,
                        ..
                    },
                ..
            }) = self.entries.get_mut(&id)
            {
                *slot = Some(colors);
                resolved.push(id);
            }
        }
        resolved.sort();
        resolved
    }

    /// Colors for `set` read from `source`'s coordinates. `None` while the
    /// producer has not loaded; falls back to the set's own axis when the
    /// producer failed or is not index-aligned.
    fn colors_from_source(
        &self,
        set: &PointSet,
        source: &PointSetId,
        axis: Axis,
        lo: f32,
        hi: f32,
    ) -> Option<ColorBuffer> {
        match self.entries.get(source).map(|e| &e.state) {
            Some(PointSetState::Ready { set: producer, .. }) => {
                if producer.len() == set.len() {
                    Some(producer.axis_colors(axis, lo, hi))
                } else {
                    log::warn!(
                        "'{}' has {} points but coloring source '{source}' \
                         has {}; using its own {axis:?} axis",
                        set.id(),
                        set.len(),
                        producer.len()
                    );
                    Some(set.axis_colors(axis, lo, hi))
                }
            }
            Some(PointSetState::Pending) => None,
            Some(PointSetState::Failed(_)) | None => {
                log::warn!(
                    "coloring source '{source}' for '{}' unavailable; using \
                     its own {axis:?} axis",
                    set.id()
                );
                Some(set.axis_colors(axis, lo, hi))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(id: &str, raw: &[Vec3]) -> PointSet {
        PointSet::from_raw(id.into(), raw).unwrap()
    }

    #[test]
    fn centered_positions_have_zero_mean() {
        let raw: Vec<Vec3> = (0..101)
            .map(|i| {
                let f = i as f32;
                Vec3::new(1000.0 + f * 0.37, -250.0 + f * f * 0.01, 3.0 - f)
            })
            .collect();
        let ps = set("embedding", &raw);
        let mean = ps.positions().iter().copied().sum::<Vec3>()
            / ps.len() as f32;
        assert!(mean.length() < 1e-3, "mean {mean:?} not ~0");
        assert!((ps.centroid().x - (1000.0 + 50.0 * 0.37)).abs() < 1e-2);
    }

    #[test]
    fn empty_input_is_reported_not_divided() {
        let err = PointSet::from_raw("empty".into(), &[]).unwrap_err();
        assert!(matches!(err, EmbedError::PointSetEmpty { .. }));
    }

    #[test]
    fn two_d_tuples_get_zero_z() {
        let ps = PointSet::from_tuples(
            "umap".into(),
            &[vec![0.0, 0.0], vec![2.0, 4.0]],
        )
        .unwrap();
        assert_eq!(ps.positions()[0], Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(ps.positions()[1], Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn bad_arity_is_rejected() {
        let err = PointSet::from_tuples(
            "bad".into(),
            &[vec![0.0, 0.0, 0.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EmbedError::MalformedPoint { index: 1, arity: 1 }
        ));
    }

    #[test]
    fn axis_rule_resolves_on_insert() {
        let mut store = PointSetStore::new();
        let id = PointSetId::from("torus");
        store.register(id.clone(), DefaultColoring::default());
        assert!(matches!(store.state(&id), Some(PointSetState::Pending)));

        let ready = store.insert(set("torus", &[Vec3::ZERO, Vec3::Y * 8.0]));
        assert_eq!(ready, vec![id.clone()]);
        assert!(matches!(
            store.state(&id),
            Some(PointSetState::Ready { .. })
        ));

        let colors = store.default_colors(&id).unwrap();
        let cmap = Colormap::Diverging { lo: -4.0, hi: 4.0 };
        assert_eq!(colors[0], cmap.evaluate(-4.0));
        assert_eq!(colors[1], cmap.evaluate(4.0));
    }

    #[test]
    fn dependent_coloring_waits_for_producer() {
        let mut store = PointSetStore::new();
        let torus = PointSetId::from("torus");
        let umap = PointSetId::from("umap");
        store.register(torus.clone(), DefaultColoring::default());
        store.register(
            umap.clone(),
            DefaultColoring::FromPointSet {
                source: torus.clone(),
                axis: Axis::Y,
                lo: -4.0,
                hi: 4.0,
            },
        );

        // Projection arrives first: its colors must wait.
        let ready = store.insert(set("umap", &[Vec3::ZERO, Vec3::X]));
        assert!(ready.is_empty());
        assert!(store.get(&umap).is_some());
        assert!(store.default_colors(&umap).is_none());

        let ready =
            store.insert(set("torus", &[Vec3::ZERO, Vec3::Y * 8.0]));
        assert_eq!(ready, vec![torus.clone(), umap.clone()]);
        assert_eq!(
            store.default_colors(&umap),
            store.default_colors(&torus)
        );
    }

    #[test]
    fn dependent_falls_back_when_producer_fails() {
        let mut store = PointSetStore::new();
        let torus = PointSetId::from("torus");
        store.register(torus.clone(), DefaultColoring::default());
        store.register(
            "umap".into(),
            DefaultColoring::FromPointSet {
                source: torus.clone(),
                axis: Axis::Y,
                lo: -4.0,
                hi: 4.0,
            },
        );
        let _ = store.mark_failed(&torus, "404".to_owned());
        let ready = store.insert(set("umap", &[Vec3::ZERO, Vec3::Y]));
        assert_eq!(ready, vec![PointSetId::from("umap")]);
    }
}
