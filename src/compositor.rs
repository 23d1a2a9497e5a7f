//! Additive blending of active scalar fields into per-point colors.
//!
//! With nothing selected a point set shows its default colors unchanged.
//! Otherwise every point starts at a dim gray floor and each loaded active
//! field adds its slot colormap on top. Sums are deliberately left
//! unclamped: the rasterizer saturates on display, which gives overlapping
//! fields their glow.
//!
//! Fields arrive one at a time, so the live buffers are updated
//! incrementally. Each arrival is matched against the selection generation
//! its request was issued under; anything from an older generation is
//! dropped before it can touch a buffer.

use rustc_hash::FxHashMap;

use crate::colormap::{Colormap, Slot};
use crate::error::EmbedError;
use crate::field::{FieldCache, FieldId, ScalarField};
use crate::point_set::{PointSetId, PointSetStore};
use crate::selection::{Generation, Selection};

/// Per-point RGB, index-aligned with a point set's positions.
pub type ColorBuffer = Vec<[f32; 3]>;

/// Floor color under overlays when none is configured.
pub const DEFAULT_FLOOR: [f32; 3] = [0.1, 0.1, 0.1];

/// A field load tagged with the selection generation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRequest {
    /// Field to load.
    pub field: FieldId,
    /// Selection generation at issue time.
    pub generation: Generation,
}

impl FieldRequest {
    /// Whether a later selection change has superseded this request.
    #[must_use]
    pub fn is_stale(&self, selection: &Selection) -> bool {
        self.generation != selection.generation()
    }
}

/// Add `field`'s slot colormap into `buffer`.
///
/// # Errors
///
/// [`EmbedError::FieldLengthMismatch`] if the field and buffer lengths
/// differ; `buffer` is left untouched.
pub fn accumulate(
    buffer: &mut [[f32; 3]],
    slot: Slot,
    field: &ScalarField,
) -> Result<(), EmbedError> {
    field.check_aligned(buffer.len())?;
    let cmap = Colormap::for_slot(slot);
    for (out, &value) in buffer.iter_mut().zip(field.values()) {
        let [r, g, b] = cmap.evaluate(value);
        out[0] += r;
        out[1] += g;
        out[2] += b;
    }
    Ok(())
}

/// Compose a full buffer from scratch.
///
/// Active fields that have not loaded yet contribute nothing; misaligned
/// fields are logged and skipped.
#[must_use]
pub fn composite(
    default_colors: &[[f32; 3]],
    selection: &Selection,
    fields: &FieldCache,
    floor: [f32; 3],
) -> ColorBuffer {
    if selection.is_empty() {
        return default_colors.to_vec();
    }

    let mut buffer = vec![floor; default_colors.len()];
    for active in selection.active() {
        let Some(field) = fields.get(&active.id) else {
            continue;
        };
        if let Err(e) = accumulate(&mut buffer, active.slot, field) {
            log::warn!("skipping overlay: {e}");
        }
    }
    buffer
}

struct LiveColors {
    colors: ColorBuffer,
    version: u64,
}

/// Owner of every point set's live color buffer.
pub struct Compositor {
    live: FxHashMap<PointSetId, LiveColors>,
    floor: [f32; 3],
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(DEFAULT_FLOOR)
    }
}

impl Compositor {
    /// Compositor with the given floor color.
    #[must_use]
    pub fn new(floor: [f32; 3]) -> Self {
        Self {
            live: FxHashMap::default(),
            floor,
        }
    }

    /// Rebuild the live buffer of every point set with default colors.
    pub fn recompose_all(
        &mut self,
        store: &PointSetStore,
        selection: &Selection,
        fields: &FieldCache,
    ) {
        for id in store.ids() {
            self.recompose(&id, store, selection, fields);
        }
    }

    /// Rebuild one point set's live buffer. No-op until its default colors
    /// exist.
    pub fn recompose(
        &mut self,
        id: &PointSetId,
        store: &PointSetStore,
        selection: &Selection,
        fields: &FieldCache,
    ) {
        let Some(defaults) = store.default_colors(id) else {
            return;
        };
        let colors = composite(defaults, selection, fields, self.floor);
        let live = self.live.entry(id.clone()).or_insert(LiveColors {
            colors: Vec::new(),
            version: 0,
        });
        live.colors = colors;
        live.version += 1;
    }

    /// Blend a newly loaded field into every live buffer.
    ///
    /// Returns `false` without touching anything when the request is stale
    /// or the field is no longer active.
    pub fn apply_loaded(
        &mut self,
        request: &FieldRequest,
        field: &ScalarField,
        selection: &Selection,
    ) -> bool {
        if request.is_stale(selection) {
            log::debug!(
                "dropping '{}' from generation {} (current {})",
                request.field,
                request.generation.get(),
                selection.generation().get()
            );
            return false;
        }
        let Some(slot) = selection.slot_of(&request.field) else {
            return false;
        };

        for (id, live) in &mut self.live {
            match accumulate(&mut live.colors, slot, field) {
                Ok(()) => live.version += 1,
                Err(e) => log::warn!("point set '{id}': {e}"),
            }
        }
        true
    }

    /// Current live colors of a point set.
    #[must_use]
    pub fn colors(&self, id: &PointSetId) -> Option<&ColorBuffer> {
        self.live.get(id).map(|l| &l.colors)
    }

    /// Counter bumped on every change to a point set's live colors.
    #[must_use]
    pub fn version(&self, id: &PointSetId) -> Option<u64> {
        self.live.get(id).map(|l| l.version)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::point_set::{DefaultColoring, PointSet};

    fn store_with(id: &str, n: usize) -> PointSetStore {
        let mut store = PointSetStore::new();
        store.register(id.into(), DefaultColoring::default());
        let raw: Vec<Vec3> =
            (0..n).map(|i| Vec3::new(0.0, i as f32, 0.0)).collect();
        let _ = store.insert(PointSet::from_raw(id.into(), &raw).unwrap());
        store
    }

    #[test]
    fn empty_selection_passes_defaults_through() {
        let defaults = vec![[0.3, 0.2, 0.9], [1.0, 0.0, 0.5]];
        let out = composite(
            &defaults,
            &Selection::new(),
            &FieldCache::new(),
            DEFAULT_FLOOR,
        );
        assert_eq!(out, defaults);
    }

    #[test]
    fn two_fields_add_on_top_of_floor() {
        let mut sel = Selection::new();
        let _ = sel.toggle(&"a".into());
        let _ = sel.toggle(&"b".into());
        let mut fields = FieldCache::new();
        fields.insert(ScalarField::new("a".into(), vec![1.0, 0.0]));
        fields.insert(ScalarField::new("b".into(), vec![1.0, 0.0]));

        let out = composite(&[[0.0; 3]; 2], &sel, &fields, DEFAULT_FLOOR);
        // Slot 0 is pure red, slot 1 pure blue.
        assert_eq!(out[0], [1.1, 0.1, 1.1]);
        assert_eq!(out[1], DEFAULT_FLOOR);
    }

    #[test]
    fn sums_are_not_clamped() {
        let mut sel = Selection::new();
        for id in ["a", "b", "c"] {
            let _ = sel.toggle(&id.into());
        }
        let _ = sel.toggle(&"b".into());
        let _ = sel.toggle(&"b".into());
        // a: slot 0, c: slot 2, b: slot 2 again.
        let mut fields = FieldCache::new();
        for id in ["a", "b", "c"] {
            fields.insert(ScalarField::new(id.into(), vec![1.0]));
        }
        let out = composite(&[[0.0; 3]], &sel, &fields, DEFAULT_FLOOR);
        assert!((out[0][1] - 2.1).abs() < 1e-6, "{:?}", out[0]);
        assert!(out[0][0] > 1.0);
    }

    #[test]
    fn misaligned_field_is_skipped_others_still_apply() {
        let mut sel = Selection::new();
        let _ = sel.toggle(&"short".into());
        let _ = sel.toggle(&"ok".into());
        let mut fields = FieldCache::new();
        fields.insert(ScalarField::new("short".into(), vec![1.0]));
        fields.insert(ScalarField::new("ok".into(), vec![1.0, 1.0]));

        let out = composite(&[[0.0; 3]; 2], &sel, &fields, DEFAULT_FLOOR);
        assert_eq!(out[0], [0.1, 0.1, 1.1]);
    }

    #[test]
    fn live_buffers_follow_incremental_loads() {
        let store = store_with("torus", 2);
        let id = PointSetId::from("torus");
        let mut sel = Selection::new();
        let fields = FieldCache::new();
        let mut comp = Compositor::default();

        comp.recompose_all(&store, &sel, &fields);
        assert_eq!(comp.colors(&id), store.default_colors(&id));

        let _ = sel.toggle(&"a".into());
        comp.recompose_all(&store, &sel, &fields);
        assert_eq!(comp.colors(&id).unwrap(), &vec![DEFAULT_FLOOR; 2]);

        let request = FieldRequest {
            field: "a".into(),
            generation: sel.generation(),
        };
        let field = ScalarField::new("a".into(), vec![1.0, 0.0]);
        assert!(comp.apply_loaded(&request, &field, &sel));
        assert_eq!(comp.colors(&id).unwrap()[0], [1.1, 0.1, 0.1]);
    }

    #[test]
    fn stale_completion_is_discarded() {
        let store = store_with("torus", 1);
        let id = PointSetId::from("torus");
        let mut sel = Selection::new();
        let fields = FieldCache::new();
        let mut comp = Compositor::default();

        let _ = sel.toggle(&"a".into());
        let stale = FieldRequest {
            field: "a".into(),
            generation: sel.generation(),
        };
        // Off and on again before the first load lands.
        let _ = sel.toggle(&"a".into());
        let _ = sel.toggle(&"a".into());
        comp.recompose_all(&store, &sel, &fields);
        let version = comp.version(&id);

        let field = ScalarField::new("a".into(), vec![1.0]);
        assert!(!comp.apply_loaded(&stale, &field, &sel));
        assert_eq!(comp.colors(&id).unwrap(), &vec![DEFAULT_FLOOR]);
        assert_eq!(comp.version(&id), version);
    }
}
