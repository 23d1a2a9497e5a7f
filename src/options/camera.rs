use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Camera", inline)]
#[serde(default)]
/// Per-tile camera projection and motion parameters.
pub struct CameraOptions {
    /// Vertical field of view in degrees.
    #[schemars(title = "Field of View", range(min = 20.0, max = 140.0))]
    pub fovy: f32,
    /// Near clipping plane distance.
    pub znear: f32,
    /// Far clipping plane distance.
    pub zfar: f32,
    /// Distance from the eye to the (centered) point cloud.
    #[schemars(title = "Distance", range(min = 1.0, max = 50.0))]
    pub distance: f32,
    /// Turntable speed of tile 0 in radians per second.
    #[schemars(title = "Auto-Rotate Speed", range(min = 0.0, max = 1.0))]
    pub auto_rotate_speed: f32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            fovy: 120.0,
            znear: 0.1,
            zfar: 1000.0,
            distance: 10.0,
            auto_rotate_speed: 0.06,
        }
    }
}
