//! Application state shared by the selection UI and the frame loop.
//!
//! A [`Session`] owns the point set store, the selection, the field cache,
//! the compositor and the background loader. It is the only place these
//! are mutated, and every mutation happens on the caller's thread: toggles
//! apply immediately, loader results apply when [`Session::poll`] drains
//! them.

use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use web_time::Instant;

use crate::compositor::{ColorBuffer, Compositor, FieldRequest};
use crate::error::EmbedError;
use crate::field::{FieldCache, FieldId};
use crate::loader::{LoadRequest, LoadResult, Loader};
use crate::options::{DataOptions, Options};
use crate::point_set::{PointSetId, PointSetStore};
use crate::selection::{Indicator, Selection, ToggleOutcome};
use crate::source::DataSource;

/// Counts of what one [`Session::poll`] applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSummary {
    /// Point sets that finished (successfully or not).
    pub point_sets: usize,
    /// Fields blended into the live buffers.
    pub fields_applied: usize,
    /// Field results dropped because the selection moved on.
    pub stale: usize,
    /// Loads that failed.
    pub failures: usize,
}

impl PollSummary {
    /// Whether anything visible may have changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.point_sets > 0 || self.fields_applied > 0
    }
}

/// Explicit application state for one viewer.
pub struct Session {
    data: DataOptions,
    indicator_reference: f32,
    store: PointSetStore,
    selection: Selection,
    fields: FieldCache,
    compositor: Compositor,
    catalogue: Vec<FieldId>,
    indicators: Vec<Indicator>,
    loader: Loader,
}

impl Session {
    /// Start a session: spawns the loader and requests every tile's point
    /// set and the catalogue.
    ///
    /// # Errors
    ///
    /// [`EmbedError::ThreadSpawn`] if the loader thread cannot start.
    pub fn new(
        options: &Options,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, EmbedError> {
        let mut loader = Loader::new(source)?;
        let mut store = PointSetStore::new();

        for tile in &options.data.tiles {
            store.register(tile.id.clone(), tile.default_coloring.clone());
            loader.submit(LoadRequest::PointSet {
                id: tile.id.clone(),
                path: tile.points.clone(),
            });
        }
        loader.submit(LoadRequest::Catalogue {
            path: options.data.catalogue.clone(),
        });

        Ok(Self {
            data: options.data.clone(),
            indicator_reference: options.colors.indicator_reference,
            store,
            selection: Selection::new(),
            fields: FieldCache::new(),
            compositor: Compositor::new(options.colors.floor),
            catalogue: Vec::new(),
            indicators: Vec::new(),
            loader,
        })
    }

    /// Toggle a field on or off.
    ///
    /// On any change the indicators are refreshed, every live buffer is
    /// recomposed from the fields already loaded, and loads are issued under
    /// the new generation for active fields still missing.
    pub fn toggle(&mut self, id: &FieldId) -> ToggleOutcome {
        let outcome = self.selection.toggle(id);
        if !outcome.changed() {
            return outcome;
        }

        if matches!(outcome, ToggleOutcome::Deactivated(_)) {
            self.fields.evict(id);
        }
        self.refresh_indicators();
        self.compositor
            .recompose_all(&self.store, &self.selection, &self.fields);
        self.request_missing_fields();
        outcome
    }

    /// Apply every finished load without blocking.
    pub fn poll(&mut self) -> PollSummary {
        let mut summary = PollSummary::default();
        while let Some(result) = self.loader.try_recv() {
            self.apply(result, &mut summary);
        }
        summary
    }

    /// Block until every submitted load has been applied or `timeout`
    /// elapses. For headless use and tests.
    pub fn wait_idle(&mut self, timeout: Duration) -> PollSummary {
        let deadline = Instant::now() + timeout;
        let mut summary = PollSummary::default();
        while self.loader.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.loader.recv_timeout(remaining) {
                Ok(result) => self.apply(result, &mut summary),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!(
                        "loader stopped with {} loads outstanding",
                        self.loader.in_flight()
                    );
                    break;
                }
            }
        }
        summary
    }

    fn apply(&mut self, result: LoadResult, summary: &mut PollSummary) {
        match result {
            LoadResult::PointSet { id, result } => {
                summary.point_sets += 1;
                match result {
                    Ok(set) => {
                        for ready in self.store.insert(set) {
                            self.compositor.recompose(
                                &ready,
                                &self.store,
                                &self.selection,
                                &self.fields,
                            );
                        }
                    }
                    Err(e) => {
                        summary.failures += 1;
                        log::warn!("point set '{id}' unavailable: {e}");
                        // Dependents waiting on this producer fall back.
                        for ready in self.store.mark_failed(&id, e.to_string())
                        {
                            self.compositor.recompose(
                                &ready,
                                &self.store,
                                &self.selection,
                                &self.fields,
                            );
                        }
                    }
                }
            }
            LoadResult::Field { request, result } => match result {
                Ok(field) => {
                    if request.is_stale(&self.selection)
                        || self.fields.contains(&request.field)
                    {
                        summary.stale += 1;
                        log::debug!(
                            "discarding superseded load of '{}'",
                            request.field
                        );
                        return;
                    }
                    if self.compositor.apply_loaded(
                        &request,
                        &field,
                        &self.selection,
                    ) {
                        summary.fields_applied += 1;
                        self.fields.insert(field);
                    }
                }
                Err(e) if request.is_stale(&self.selection) => {
                    summary.stale += 1;
                    log::debug!(
                        "superseded load of '{}' failed: {e}",
                        request.field
                    );
                }
                Err(e) => {
                    // Stays active but unloaded; toggling off and on retries.
                    summary.failures += 1;
                    log::warn!("field '{}' unavailable: {e}", request.field);
                }
            },
            LoadResult::Catalogue(result) => match result {
                Ok(ids) => {
                    log::info!("catalogue lists {} fields", ids.len());
                    self.catalogue = ids;
                    self.refresh_indicators();
                }
                Err(e) => {
                    summary.failures += 1;
                    log::warn!("catalogue unavailable: {e}");
                }
            },
        }
    }

    fn request_missing_fields(&mut self) {
        let generation = self.selection.generation();
        for active in self.selection.active() {
            if self.fields.contains(&active.id) {
                continue;
            }
            self.loader.submit(LoadRequest::Field {
                request: FieldRequest {
                    field: active.id.clone(),
                    generation,
                },
                path: self.data.field_path(&active.id),
            });
        }
    }

    fn refresh_indicators(&mut self) {
        self.indicators = self
            .selection
            .indicators(&self.catalogue, self.indicator_reference);
    }

    /// Point set store.
    #[must_use]
    pub fn store(&self) -> &PointSetStore {
        &self.store
    }

    /// Current selection.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selectable field identifiers, in catalogue order.
    #[must_use]
    pub fn catalogue(&self) -> &[FieldId] {
        &self.catalogue
    }

    /// Thumbnail indicator state for every catalogue entry.
    #[must_use]
    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    /// Thumbnail path of a field.
    #[must_use]
    pub fn thumbnail_path(&self, id: &FieldId) -> String {
        self.data.thumbnail_path(id)
    }

    /// Live colors of a point set.
    #[must_use]
    pub fn colors(&self, id: &PointSetId) -> Option<&ColorBuffer> {
        self.compositor.colors(id)
    }

    /// Change counter of a point set's live colors.
    #[must_use]
    pub fn colors_version(&self, id: &PointSetId) -> Option<u64> {
        self.compositor.version(id)
    }

    /// Tile ids in display order.
    #[must_use]
    pub fn tile_ids(&self) -> Vec<PointSetId> {
        self.data.tile_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::Colormap;
    use crate::compositor::DEFAULT_FLOOR;
    use crate::source::MemorySource;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering::SeqCst;

    const WAIT: Duration = Duration::from_secs(5);

    fn field_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_file("points.json", "[[0, -4, 0], [0, 4, 0]]")
            .with_file("points_umap.json", "[[5, 5], [7, 5]]")
            .with_file("cells.txt", "a\nb\nc\nd\n")
            .with_file("rates/a.bin", field_bytes(&[1.0, 0.0]))
            .with_file("rates/b.bin", field_bytes(&[0.0, 1.0]))
            .with_file("rates/c.bin", field_bytes(&[1.0]))
    }

    /// Serves `inner`, but fails the first fetch of `flaky` and panics on
    /// any fetch of `fatal`.
    struct ScriptedSource {
        inner: MemorySource,
        flaky: &'static str,
        flaky_failed: AtomicBool,
        fatal: &'static str,
    }

    impl ScriptedSource {
        fn new(flaky: &'static str, fatal: &'static str) -> Self {
            Self {
                inner: source(),
                flaky,
                flaky_failed: AtomicBool::new(false),
                fatal,
            }
        }
    }

    impl DataSource for ScriptedSource {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, EmbedError> {
            assert_ne!(path, self.fatal, "backend crashed");
            if path == self.flaky && !self.flaky_failed.swap(true, SeqCst) {
                return Err(EmbedError::Fetch {
                    resource: path.to_owned(),
                    reason: "connection reset".to_owned(),
                });
            }
            self.inner.fetch(path)
        }
    }

    fn session() -> Session {
        let mut s = Session::new(&Options::default(), Arc::new(source()))
            .unwrap();
        let _ = s.wait_idle(WAIT);
        s
    }

    #[test]
    fn startup_loads_tiles_colors_and_catalogue() {
        let s = session();
        assert_eq!(s.catalogue().len(), 4);
        assert!(s.indicators().iter().all(|i| i.border.is_none()));

        let torus = PointSetId::from("torus");
        let umap = PointSetId::from("umap");
        let cmap = Colormap::Diverging { lo: -4.0, hi: 4.0 };
        let expected = vec![cmap.evaluate(-4.0), cmap.evaluate(4.0)];
        assert_eq!(s.colors(&torus), Some(&expected));
        // The projection borrows the torus coloring.
        assert_eq!(s.colors(&umap), Some(&expected));
    }

    #[test]
    fn toggled_field_blends_into_every_tile() {
        let mut s = session();
        let _ = s.toggle(&"a".into());
        let torus = PointSetId::from("torus");
        assert_eq!(s.colors(&torus).unwrap(), &vec![DEFAULT_FLOOR; 2]);
        assert!(s.indicators()[0].border.is_some());

        let summary = s.wait_idle(WAIT);
        assert_eq!(summary.fields_applied, 1);
        for id in s.tile_ids() {
            assert_eq!(s.colors(&id).unwrap()[0], [1.1, 0.1, 0.1]);
        }
    }

    #[test]
    fn deselecting_everything_restores_defaults() {
        let mut s = session();
        let torus = PointSetId::from("torus");
        let defaults = s.colors(&torus).cloned();
        let _ = s.toggle(&"a".into());
        let _ = s.wait_idle(WAIT);
        let _ = s.toggle(&"a".into());
        assert_eq!(s.colors(&torus).cloned(), defaults);
    }

    #[test]
    fn off_on_before_load_applies_once() {
        let mut s = session();
        let _ = s.toggle(&"a".into());
        let _ = s.toggle(&"a".into());
        let _ = s.toggle(&"a".into());
        let summary = s.wait_idle(WAIT);
        assert_eq!(summary.fields_applied, 1);
        assert_eq!(summary.stale, 1);
        let torus = PointSetId::from("torus");
        assert_eq!(s.colors(&torus).unwrap()[0], [1.1, 0.1, 0.1]);
    }

    #[test]
    fn deselected_field_arriving_late_is_ignored() {
        let mut s = session();
        let _ = s.toggle(&"a".into());
        let _ = s.toggle(&"b".into());
        let _ = s.toggle(&"a".into());
        let _ = s.wait_idle(WAIT);
        let torus = PointSetId::from("torus");
        // Only b (slot 1, blue) contributes.
        assert_eq!(
            s.colors(&torus).unwrap(),
            &vec![[0.1, 0.1, 0.1], [0.1, 0.1, 1.1]]
        );
    }

    #[test]
    fn misaligned_and_missing_fields_leave_the_rest_working() {
        let mut s = session();
        let _ = s.toggle(&"c".into()); // one value for two points
        let _ = s.toggle(&"d".into()); // no payload at all
        let _ = s.toggle(&"b".into());
        let summary = s.wait_idle(WAIT);
        assert_eq!(summary.failures, 1);
        let torus = PointSetId::from("torus");
        // b landed in slot 2; c contributes nothing.
        assert_eq!(s.colors(&torus).unwrap()[1], [0.6, 1.1, 0.1]);
        assert!(s.selection().is_active(&"d".into()));
    }

    #[test]
    fn capacity_rejection_changes_nothing() {
        let mut s = session();
        for id in ["a", "b", "c"] {
            let _ = s.toggle(&id.into());
        }
        let _ = s.wait_idle(WAIT);
        let generation = s.selection().generation();
        assert_eq!(s.toggle(&"d".into()), ToggleOutcome::Rejected);
        assert_eq!(s.selection().generation(), generation);
        assert!(s.indicators()[3].border.is_none());
    }

    #[test]
    fn empty_point_set_fails_only_its_tile() {
        let source = source().with_file("points_umap.json", "[]");
        let mut s =
            Session::new(&Options::default(), Arc::new(source)).unwrap();
        let summary = s.wait_idle(WAIT);
        assert_eq!(summary.failures, 1);
        assert!(s.colors(&"umap".into()).is_none());
        assert!(s.colors(&"torus".into()).is_some());
    }

    #[test]
    fn failed_field_is_retried_by_toggling_off_and_on() {
        let source = ScriptedSource::new("rates/a.bin", "");
        let mut s =
            Session::new(&Options::default(), Arc::new(source)).unwrap();
        let _ = s.wait_idle(WAIT);
        let torus = PointSetId::from("torus");

        let _ = s.toggle(&"a".into());
        let first = s.wait_idle(WAIT);
        assert_eq!(first.failures, 1);
        assert_eq!(first.fields_applied, 0);
        assert!(s.selection().is_active(&"a".into()));
        assert_eq!(s.colors(&torus).unwrap()[0], DEFAULT_FLOOR);

        let _ = s.toggle(&"a".into());
        let _ = s.toggle(&"a".into());
        let second = s.wait_idle(WAIT);
        assert_eq!(second.failures, 0);
        assert_eq!(second.fields_applied, 1);
        assert_eq!(s.colors(&torus).unwrap()[0], [1.1, 0.1, 0.1]);
    }

    #[test]
    fn wait_idle_returns_once_the_loader_dies() {
        let source = ScriptedSource::new("", "rates/a.bin");
        let mut s =
            Session::new(&Options::default(), Arc::new(source)).unwrap();
        let _ = s.wait_idle(WAIT);

        let _ = s.toggle(&"a".into());
        let started = Instant::now();
        let summary = s.wait_idle(Duration::from_secs(60));
        assert!(started.elapsed() < WAIT);
        assert_eq!(summary, PollSummary::default());
        assert!(s.colors(&"torus".into()).is_some());
    }
}
