use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bloom and tone-mapping parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Effects", inline)]
#[serde(default)]
pub struct PostProcessingOptions {
    /// Add a blurred glow of the bright sprites on top of the tiles.
    #[schemars(title = "Bloom")]
    pub bloom_enabled: bool,
    /// Multiplier on the summed glow.
    #[schemars(title = "Bloom Strength", range(min = 0.0, max = 3.0))]
    pub bloom_strength: f32,
    /// 0 keeps the glow tight around each sprite, 1 spreads it widest.
    #[schemars(title = "Bloom Radius", range(min = 0.0, max = 1.0))]
    pub bloom_radius: f32,
    /// Luminance a texel needs before it glows.
    #[schemars(title = "Bloom Threshold", range(min = 0.0, max = 2.0))]
    pub bloom_threshold: f32,
    /// Linear scale applied before ACES tone mapping.
    #[schemars(title = "Exposure", range(min = 0.1, max = 4.0))]
    pub exposure: f32,
}

impl Default for PostProcessingOptions {
    fn default() -> Self {
        Self {
            bloom_enabled: true,
            bloom_strength: 1.0,
            bloom_radius: 0.3,
            bloom_threshold: 0.0,
            exposure: 1.2,
        }
    }
}
