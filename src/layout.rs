//! Square tile layout for side-by-side viewports.
//!
//! The window is split into `tile_count` equal slices along the stacking
//! axis; each slice is one tile's scissor rectangle. Inside it the largest
//! square that fits both the slice and the anchored band of the other axis
//! becomes the viewport.
//!
//! Rectangles use framebuffer coordinates: origin top-left, `y` down. In a
//! vertical stack tile 0 is the bottom-most slice, so it stays next to the
//! primary view whichever way the window is oriented.
//!
//! All functions are pure; [`crate::frame::FrameDriver`] applies the result.

use serde::{Deserialize, Serialize};

/// Aspect ratio above which tiles are stacked horizontally.
pub const DEFAULT_ASPECT_THRESHOLD: f32 = 1.0;

/// Drawing surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSize {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl WindowSize {
    /// Size from integer pixel dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Whether both dimensions are finite and positive.
    #[must_use]
    pub fn is_drawable(self) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Direction along which tiles are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stacking {
    /// Tiles left to right.
    Horizontal,
    /// Tiles bottom to top.
    Vertical,
}

impl Stacking {
    /// Stacking for a window, switching to horizontal strictly above
    /// `threshold` (width / height).
    #[must_use]
    pub fn for_window(window: WindowSize, threshold: f32) -> Self {
        if window.width / window.height > threshold {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect {
    /// Snap edges to whole pixels and clip to `bounds`, as
    /// `(x, y, width, height)`.
    ///
    /// Adjacent rectangles snap to shared edges, so tiles never overlap or
    /// leave a gap.
    #[must_use]
    pub fn to_pixels(self, bounds: (u32, u32)) -> (u32, u32, u32, u32) {
        let snap = |v: f32, max: u32| (v.round().max(0.0) as u32).min(max);
        let x0 = snap(self.x, bounds.0);
        let y0 = snap(self.y, bounds.1);
        let x1 = snap(self.x + self.width, bounds.0);
        let y1 = snap(self.y + self.height, bounds.1);
        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

/// Inputs for laying out one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileSpec {
    /// Stacking direction.
    pub stacking: Stacking,
    /// Total number of tiles.
    pub tile_count: usize,
    /// Index of the tile to lay out.
    pub tile_index: usize,
    /// Position of the tile band along the non-stacking axis, in `[0, 1]`
    /// (0.5 = centered).
    pub anchor: f32,
}

/// Computed rectangles for one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLayout {
    /// Clip region; tiles' scissors partition the window.
    pub scissor: Rect,
    /// Square draw region inside the scissor.
    pub viewport: Rect,
    /// Side length of the viewport square.
    pub side: f32,
    /// Point-size multiplier, `sqrt(side)`.
    pub point_scale: f32,
}

/// Fraction of the non-stacking axis usable at `anchor`.
///
/// Centered anchors use the whole axis; moving toward either edge shrinks
/// the band linearly to zero at the edge.
#[must_use]
pub fn available_fraction(anchor: f32) -> f32 {
    if anchor == 0.5 {
        1.0
    } else if anchor > 0.5 {
        (1.0 - anchor) * 2.0
    } else {
        anchor * 2.0
    }
}

/// Lay out a single tile. `None` for an undrawable window or an
/// out-of-range tile.
#[must_use]
pub fn layout(window: WindowSize, spec: TileSpec) -> Option<TileLayout> {
    if !window.is_drawable()
        || spec.tile_count == 0
        || spec.tile_index >= spec.tile_count
        || !spec.anchor.is_finite()
    {
        return None;
    }
    let anchor = spec.anchor.clamp(0.0, 1.0);

    // T: stacking axis, N: the other one.
    let (t_len, n_len) = match spec.stacking {
        Stacking::Horizontal => (window.width, window.height),
        Stacking::Vertical => (window.height, window.width),
    };

    let slice = t_len / spec.tile_count as f32;
    let side = slice.min(n_len * available_fraction(anchor));

    let slot = match spec.stacking {
        Stacking::Horizontal => spec.tile_index,
        Stacking::Vertical => spec.tile_count - 1 - spec.tile_index,
    };
    let slice_start = slot as f32 * slice;
    let along_t = slice_start + (slice - side) / 2.0;
    let along_n = (n_len - side) * anchor;

    let (scissor, viewport) = match spec.stacking {
        Stacking::Horizontal => (
            Rect {
                x: slice_start,
                y: 0.0,
                width: slice,
                height: n_len,
            },
            Rect {
                x: along_t,
                y: along_n,
                width: side,
                height: side,
            },
        ),
        Stacking::Vertical => (
            Rect {
                x: 0.0,
                y: slice_start,
                width: n_len,
                height: slice,
            },
            Rect {
                x: along_n,
                y: along_t,
                width: side,
                height: side,
            },
        ),
    };

    Some(TileLayout {
        scissor,
        viewport,
        side,
        point_scale: side.max(0.0).sqrt(),
    })
}

/// Lay out every tile, in index order. Empty for an undrawable window.
#[must_use]
pub fn layout_all(
    window: WindowSize,
    stacking: Stacking,
    tile_count: usize,
    anchor: f32,
) -> Vec<TileLayout> {
    (0..tile_count)
        .map_while(|tile_index| {
            layout(
                window,
                TileSpec {
                    stacking,
                    tile_count,
                    tile_index,
                    anchor,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(
        stacking: Stacking,
        count: usize,
        index: usize,
        anchor: f32,
    ) -> TileSpec {
        TileSpec {
            stacking,
            tile_count: count,
            tile_index: index,
            anchor,
        }
    }

    #[test]
    fn centered_horizontal_pair_fills_window() {
        let window = WindowSize::new(1000, 500);
        for i in 0..2 {
            let tile =
                layout(window, spec(Stacking::Horizontal, 2, i, 0.5)).unwrap();
            assert_eq!(tile.scissor.width, 500.0);
            assert_eq!(tile.scissor.height, 500.0);
            assert_eq!(tile.side, 500.0);
            assert_eq!(tile.viewport.x, tile.scissor.x);
            assert_eq!(tile.viewport.y, 0.0);
            assert_eq!(tile.scissor.x, 500.0 * i as f32);
        }
    }

    #[test]
    fn off_center_anchor_shrinks_and_offsets_viewport() {
        let window = WindowSize::new(1000, 400);
        let tile =
            layout(window, spec(Stacking::Horizontal, 2, 0, 0.75)).unwrap();
        assert_eq!(available_fraction(0.75), 0.5);
        assert_eq!(tile.side, 200.0);
        assert_eq!(tile.viewport.y, 150.0);
        // Centered in its 500px slice.
        assert_eq!(tile.viewport.x, 150.0);
        assert_eq!(tile.scissor.width, 500.0);
    }

    #[test]
    fn anchor_below_half_offsets_toward_the_near_edge() {
        let window = WindowSize::new(1000, 400);
        let tile =
            layout(window, spec(Stacking::Horizontal, 2, 0, 0.25)).unwrap();
        assert_eq!(tile.side, 200.0);
        assert_eq!(tile.viewport.y, 50.0);
        assert_eq!(tile.viewport.x, 150.0);
        assert_eq!(tile.viewport.width, 200.0);
        assert_eq!(tile.scissor.height, 400.0);
    }

    #[test]
    fn anchor_below_half_mirrors_above_half() {
        assert_eq!(available_fraction(0.25), available_fraction(0.75));
        assert_eq!(available_fraction(0.0), 0.0);
        assert_eq!(available_fraction(1.0), 0.0);
        assert_eq!(available_fraction(0.5), 1.0);
    }

    #[test]
    fn square_window_stacks_vertically() {
        let threshold = DEFAULT_ASPECT_THRESHOLD;
        assert_eq!(
            Stacking::for_window(WindowSize::new(800, 800), threshold),
            Stacking::Vertical
        );
        assert_eq!(
            Stacking::for_window(
                WindowSize {
                    width: 1000.1,
                    height: 1000.0
                },
                threshold
            ),
            Stacking::Horizontal
        );
    }

    #[test]
    fn vertical_stack_puts_tile_zero_at_bottom() {
        let window = WindowSize::new(300, 800);
        let bottom =
            layout(window, spec(Stacking::Vertical, 2, 0, 0.5)).unwrap();
        let top = layout(window, spec(Stacking::Vertical, 2, 1, 0.5)).unwrap();
        assert_eq!(bottom.scissor.y, 400.0);
        assert_eq!(top.scissor.y, 0.0);
        assert_eq!(bottom.scissor.width, 300.0);
        assert_eq!(bottom.side, 300.0);
        assert_eq!(bottom.viewport.y, 450.0);
        assert_eq!(bottom.viewport.x, 0.0);
    }

    #[test]
    fn scissors_partition_the_stacking_axis() {
        let window = WindowSize::new(1001, 333);
        let tiles = layout_all(window, Stacking::Horizontal, 3, 0.5);
        assert_eq!(tiles.len(), 3);
        let mut edge = 0;
        for tile in &tiles {
            let (x, _, w, h) = tile.scissor.to_pixels((1001, 333));
            assert_eq!(x, edge);
            assert_eq!(h, 333);
            edge = x + w;
        }
        assert_eq!(edge, 1001);
    }

    #[test]
    fn point_scale_is_sqrt_of_side() {
        let tile = layout(
            WindowSize::new(800, 400),
            spec(Stacking::Horizontal, 2, 1, 0.5),
        )
        .unwrap();
        assert_eq!(tile.point_scale, 20.0);
    }

    #[test]
    fn degenerate_inputs_yield_nothing() {
        let good = spec(Stacking::Horizontal, 2, 0, 0.5);
        assert!(layout(WindowSize::new(0, 500), good).is_none());
        assert!(layout(
            WindowSize {
                width: -10.0,
                height: 5.0
            },
            good
        )
        .is_none());
        assert!(layout(
            WindowSize {
                width: f32::NAN,
                height: 5.0
            },
            good
        )
        .is_none());
        assert!(layout(
            WindowSize::new(100, 100),
            spec(Stacking::Horizontal, 0, 0, 0.5)
        )
        .is_none());
        assert!(layout(
            WindowSize::new(100, 100),
            spec(Stacking::Horizontal, 2, 2, 0.5)
        )
        .is_none());
        assert!(layout_all(WindowSize::new(0, 0), Stacking::Vertical, 2, 0.5)
            .is_empty());
    }
}
