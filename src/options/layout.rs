use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::layout::DEFAULT_ASPECT_THRESHOLD;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Layout", inline)]
#[serde(default)]
/// Tile layout parameters.
pub struct LayoutOptions {
    /// Position of the tile band across the stacking axis (0.5 = centered).
    #[schemars(title = "Anchor", range(min = 0.0, max = 1.0))]
    pub anchor: f32,
    /// Width / height ratio above which tiles sit side by side.
    pub aspect_threshold: f32,
    /// World-space point size before per-tile scaling.
    #[schemars(title = "Point Size", range(min = 0.001, max = 0.05))]
    pub point_size: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            anchor: 0.5,
            aspect_threshold: DEFAULT_ASPECT_THRESHOLD,
            point_size: 0.0025,
        }
    }
}
