use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::compositor::DEFAULT_FLOOR;

/// Overlay and background color options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Colors", inline)]
#[serde(default)]
pub struct ColorOptions {
    /// RGB every point starts from while any overlay is active.
    pub floor: [f32; 3],
    /// Value at which a slot colormap is sampled for thumbnail borders.
    #[schemars(title = "Indicator Reference", range(min = 0.0, max = 1.0))]
    pub indicator_reference: f32,
    /// Clear color of the drawing surface.
    pub background: [f32; 3],
}

impl Default for ColorOptions {
    fn default() -> Self {
        Self {
            floor: DEFAULT_FLOOR,
            indicator_reference: 0.8,
            background: [0.0, 0.0, 0.0],
        }
    }
}
