//! Viewer configuration with TOML file support.
//!
//! All tweakable settings (tile layout, overlay colors, camera, effects,
//! data locations) are consolidated here. Options serialize to/from TOML; every
//! section uses `#[serde(default)]` so a file only needs the keys it
//! overrides.

mod camera;
mod colors;
mod data;
mod layout;
mod post_processing;

use std::path::Path;

pub use camera::CameraOptions;
pub use colors::ColorOptions;
pub use data::{DataOptions, TileSource};
pub use layout::LayoutOptions;
pub use post_processing::PostProcessingOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::EmbedError;

/// Top-level options container.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Tile layout parameters.
    pub layout: LayoutOptions,
    /// Overlay floor, indicator and background colors.
    pub colors: ColorOptions,
    /// Camera projection and motion parameters.
    pub camera: CameraOptions,
    /// Bloom and tone mapping.
    pub post_processing: PostProcessingOptions,
    /// Data source locations.
    pub data: DataOptions,
}

impl Options {
    /// JSON Schema of the options file, for editor validation.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// [`EmbedError::Io`] if the file cannot be read,
    /// [`EmbedError::OptionsParse`] if it is not valid options TOML.
    pub fn load(path: &Path) -> Result<Self, EmbedError> {
        let content = std::fs::read_to_string(path).map_err(EmbedError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse options from a TOML string.
    ///
    /// # Errors
    ///
    /// [`EmbedError::OptionsParse`] if `content` is not valid options TOML.
    pub fn from_toml(content: &str) -> Result<Self, EmbedError> {
        toml::from_str(content)
            .map_err(|e| EmbedError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// [`EmbedError::OptionsParse`] on serialization failure,
    /// [`EmbedError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), EmbedError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EmbedError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(EmbedError::Io)?;
        }
        std::fs::write(path, content).map_err(EmbedError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point_set::DefaultColoring;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: Options = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r"
[layout]
anchor = 0.75
";
        let opts = Options::from_toml(toml_str).unwrap();
        assert_eq!(opts.layout.anchor, 0.75);
        // Everything else should be default
        assert_eq!(opts.layout.aspect_threshold, 1.0);
        assert_eq!(opts.colors.floor, [0.1, 0.1, 0.1]);
        assert_eq!(opts.data.tiles.len(), 2);
    }

    #[test]
    fn tiles_parse_with_tagged_coloring() {
        let toml_str = r#"
[data]
tiles = [
    { id = "torus", points = "a.json" },
    { id = "umap", points = "b.json", default_coloring = { kind = "from_point_set", source = "torus", axis = "z", lo = -1.0, hi = 1.0 } },
]
"#;
        let opts = Options::from_toml(toml_str).unwrap();
        assert_eq!(
            opts.data.tiles[0].default_coloring,
            DefaultColoring::default()
        );
        assert!(matches!(
            opts.data.tiles[1].default_coloring,
            DefaultColoring::FromPointSet { .. }
        ));
        assert_eq!(opts.data.catalogue, "cells.txt");
    }

    #[test]
    fn templates_substitute_field_id() {
        let data = DataOptions::default();
        assert_eq!(data.field_path(&"c12".into()), "rates/c12.bin");
        assert_eq!(data.thumbnail_path(&"c12".into()), "thumbnails/c12.png");
    }

    #[test]
    fn post_processing_section_overrides_bloom() {
        let toml_str = r"
[post_processing]
bloom_enabled = false
exposure = 0.9
";
        let opts = Options::from_toml(toml_str).unwrap();
        assert!(!opts.post_processing.bloom_enabled);
        assert_eq!(opts.post_processing.exposure, 0.9);
        assert_eq!(opts.post_processing.bloom_strength, 1.0);
        assert_eq!(opts.post_processing.bloom_radius, 0.3);
        assert_eq!(opts.post_processing.bloom_threshold, 0.0);
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let dir = std::env::temp_dir()
            .join(format!("embedview-options-{}", std::process::id()));
        let path = dir.join("nested").join("embedview.toml");
        let mut opts = Options::default();
        opts.layout.anchor = 0.3;
        opts.post_processing.bloom_enabled = false;

        opts.save(&path).unwrap();
        let loaded = Options::load(&path).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(loaded, opts);
    }

    #[test]
    fn invalid_toml_is_an_options_error() {
        let err = Options::from_toml("[layout\nanchor = ").unwrap_err();
        assert!(matches!(err, EmbedError::OptionsParse(_)));
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(Options::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();

        for section in
            ["layout", "colors", "camera", "post_processing", "data"]
        {
            assert!(props.contains_key(section), "missing {section}");
        }

        let anchor = &props["layout"]["properties"]["anchor"];
        assert_eq!(anchor["title"], "Anchor");
        assert_eq!(anchor["minimum"], 0.0);
        assert_eq!(anchor["maximum"], 1.0);
        assert!(anchor.get("step").is_none());
        assert!(props["data"]["properties"].get("tiles").is_some());
    }
}
