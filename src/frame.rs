//! Per-frame orchestration of tile layout and render dispatch.
//!
//! The driver never touches GPU state itself. It computes every tile's
//! rectangles with [`crate::layout`] and hands them, in stacking order, to a
//! [`TileRenderer`]. Frames for undrawable window sizes are skipped
//! entirely.

use crate::layout::{self, Rect, Stacking, TileLayout, WindowSize};
use crate::options::LayoutOptions;
use crate::point_set::{PointSetId, PointSetState, PointSetStore};

/// Rendering backend the frame driver dispatches to.
///
/// Calls within a frame arrive in this order: `set_scissor(None)`, `clear`,
/// then for each drawable tile `set_scissor(Some)`, `set_viewport`,
/// `render_tile`, and finally `set_scissor(None)`.
pub trait TileRenderer {
    /// Tile geometry changed: data became ready or the window resized.
    fn configure(
        &mut self,
        window: WindowSize,
        stacking: Stacking,
        tiles: &[TileLayout],
    );

    /// Clear the whole surface.
    fn clear(&mut self);

    /// Restrict drawing to `rect`, or lift the restriction with `None`.
    fn set_scissor(&mut self, rect: Option<Rect>);

    /// Project subsequent draws onto `rect`.
    fn set_viewport(&mut self, rect: Rect);

    /// Draw one tile's point set with point sizes scaled by
    /// `tile.point_scale`.
    fn render_tile(&mut self, scene: &PointSetId, tile: &TileLayout);
}

/// What happened in one call to [`FrameDriver::frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Window size was not drawable; nothing was issued.
    Skipped,
    /// Frame was drawn.
    Drawn {
        /// Tiles rendered.
        tiles: usize,
        /// Tiles skipped because their point set is not ready or failed.
        missing: usize,
    },
}

/// Drives layout and rendering once per animation frame.
pub struct FrameDriver {
    tiles: Vec<PointSetId>,
    anchor: f32,
    aspect_threshold: f32,
    window: WindowSize,
    /// Geometry must be pushed to the renderer once data is ready.
    pending_configure: bool,
    initial_layout_applied: bool,
}

impl FrameDriver {
    /// Driver for `tiles` (one point set per tile, tile 0 first).
    #[must_use]
    pub fn new(
        tiles: Vec<PointSetId>,
        window: WindowSize,
        options: &LayoutOptions,
    ) -> Self {
        Self {
            tiles,
            anchor: options.anchor,
            aspect_threshold: options.aspect_threshold,
            window,
            pending_configure: true,
            initial_layout_applied: false,
        }
    }

    /// Record a new surface size; layout is recomputed on the next frame.
    pub fn resize(&mut self, window: WindowSize) {
        self.window = window;
        self.pending_configure = true;
    }

    /// Change the anchor of the tile band.
    pub fn set_anchor(&mut self, anchor: f32) {
        self.anchor = anchor;
        self.pending_configure = true;
    }

    /// Current stacking for the recorded window size.
    #[must_use]
    pub fn stacking(&self) -> Stacking {
        Stacking::for_window(self.window, self.aspect_threshold)
    }

    /// Whether the first data-ready layout has been pushed to the renderer.
    #[must_use]
    pub fn initial_layout_applied(&self) -> bool {
        self.initial_layout_applied
    }

    /// Current tile layouts, in index order.
    #[must_use]
    pub fn layouts(&self) -> Vec<TileLayout> {
        layout::layout_all(
            self.window,
            self.stacking(),
            self.tiles.len(),
            self.anchor,
        )
    }

    /// Run one frame against `renderer`.
    pub fn frame<R: TileRenderer>(
        &mut self,
        store: &PointSetStore,
        renderer: &mut R,
    ) -> FrameOutcome {
        if !self.window.is_drawable() {
            return FrameOutcome::Skipped;
        }
        let stacking = self.stacking();
        let layouts = self.layouts();
        if layouts.len() != self.tiles.len() {
            return FrameOutcome::Skipped;
        }

        let data_ready = self.tiles.iter().all(|id| {
            !matches!(store.state(id), None | Some(PointSetState::Pending))
        });
        if self.pending_configure && data_ready {
            renderer.configure(self.window, stacking, &layouts);
            self.pending_configure = false;
            if !self.initial_layout_applied {
                self.initial_layout_applied = true;
                log::info!(
                    "initial layout applied: {} tiles, {stacking:?}, {}x{}",
                    layouts.len(),
                    self.window.width,
                    self.window.height
                );
            }
        }

        renderer.set_scissor(None);
        renderer.clear();

        let mut drawn = 0;
        let mut missing = 0;
        for (id, tile) in self.tiles.iter().zip(&layouts) {
            if store.default_colors(id).is_none() {
                missing += 1;
                continue;
            }
            renderer.set_scissor(Some(tile.scissor));
            renderer.set_viewport(tile.viewport);
            renderer.render_tile(id, tile);
            drawn += 1;
        }

        renderer.set_scissor(None);
        FrameOutcome::Drawn {
            tiles: drawn,
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::point_set::{DefaultColoring, PointSet};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Configure(Stacking, usize),
        Clear,
        Scissor(Option<Rect>),
        Viewport(Rect),
        Render(String, f32),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl TileRenderer for Recorder {
        fn configure(
            &mut self,
            _window: WindowSize,
            stacking: Stacking,
            tiles: &[TileLayout],
        ) {
            self.calls.push(Call::Configure(stacking, tiles.len()));
        }

        fn clear(&mut self) {
            self.calls.push(Call::Clear);
        }

        fn set_scissor(&mut self, rect: Option<Rect>) {
            self.calls.push(Call::Scissor(rect));
        }

        fn set_viewport(&mut self, rect: Rect) {
            self.calls.push(Call::Viewport(rect));
        }

        fn render_tile(&mut self, scene: &PointSetId, tile: &TileLayout) {
            self.calls
                .push(Call::Render(scene.to_string(), tile.point_scale));
        }
    }

    fn ids() -> Vec<PointSetId> {
        vec!["torus".into(), "umap".into()]
    }

    fn store(loaded: &[&str]) -> PointSetStore {
        let mut store = PointSetStore::new();
        for id in ids() {
            store.register(id, DefaultColoring::default());
        }
        for id in loaded {
            let _ = store.insert(
                PointSet::from_raw((*id).into(), &[Vec3::ZERO, Vec3::X])
                    .unwrap(),
            );
        }
        store
    }

    #[test]
    fn frame_renders_tiles_in_order_and_leaves_scissor_off() {
        let store = store(&["torus", "umap"]);
        let mut driver = FrameDriver::new(
            ids(),
            WindowSize::new(1000, 500),
            &LayoutOptions::default(),
        );
        let mut r = Recorder::default();

        let outcome = driver.frame(&store, &mut r);
        assert_eq!(
            outcome,
            FrameOutcome::Drawn {
                tiles: 2,
                missing: 0
            }
        );
        let layouts = driver.layouts();
        assert_eq!(
            r.calls,
            vec![
                Call::Configure(Stacking::Horizontal, 2),
                Call::Scissor(None),
                Call::Clear,
                Call::Scissor(Some(layouts[0].scissor)),
                Call::Viewport(layouts[0].viewport),
                Call::Render("torus".to_owned(), layouts[0].point_scale),
                Call::Scissor(Some(layouts[1].scissor)),
                Call::Viewport(layouts[1].viewport),
                Call::Render("umap".to_owned(), layouts[1].point_scale),
                Call::Scissor(None),
            ]
        );
    }

    #[test]
    fn initial_layout_waits_for_all_tiles_then_applies_once() {
        let mut store = store(&["torus"]);
        let mut driver = FrameDriver::new(
            ids(),
            WindowSize::new(1000, 500),
            &LayoutOptions::default(),
        );
        let mut r = Recorder::default();

        let _ = driver.frame(&store, &mut r);
        assert!(!driver.initial_layout_applied());
        assert!(!r.calls.iter().any(|c| matches!(c, Call::Configure(..))));

        let _ = store.insert(
            PointSet::from_raw("umap".into(), &[Vec3::ZERO]).unwrap(),
        );
        let _ = driver.frame(&store, &mut r);
        let _ = driver.frame(&store, &mut r);
        assert!(driver.initial_layout_applied());
        let configures = r
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Configure(..)))
            .count();
        assert_eq!(configures, 1);
    }

    #[test]
    fn resize_reconfigures_with_new_orientation() {
        let store = store(&["torus", "umap"]);
        let mut driver = FrameDriver::new(
            ids(),
            WindowSize::new(1000, 500),
            &LayoutOptions::default(),
        );
        let mut r = Recorder::default();
        let _ = driver.frame(&store, &mut r);
        driver.resize(WindowSize::new(500, 500));
        r.calls.clear();
        let _ = driver.frame(&store, &mut r);
        assert_eq!(r.calls[0], Call::Configure(Stacking::Vertical, 2));
    }

    #[test]
    fn failed_tile_is_skipped_others_render() {
        let mut store = store(&["umap"]);
        let _ = store.mark_failed(&"torus".into(), "empty".to_owned());
        let mut driver = FrameDriver::new(
            ids(),
            WindowSize::new(1000, 500),
            &LayoutOptions::default(),
        );
        let mut r = Recorder::default();
        assert_eq!(
            driver.frame(&store, &mut r),
            FrameOutcome::Drawn {
                tiles: 1,
                missing: 1
            }
        );
        assert_eq!(r.calls.last(), Some(&Call::Scissor(None)));
    }

    #[test]
    fn zero_sized_window_skips_frame() {
        let store = store(&["torus", "umap"]);
        let mut driver = FrameDriver::new(
            ids(),
            WindowSize::new(0, 500),
            &LayoutOptions::default(),
        );
        let mut r = Recorder::default();
        assert_eq!(driver.frame(&store, &mut r), FrameOutcome::Skipped);
        assert!(r.calls.is_empty());
    }
}
