use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::field::FieldId;
use crate::point_set::{Axis, DefaultColoring, PointSetId};

/// One tile's point data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TileSource {
    /// Point set id (also the tile's scene id).
    pub id: PointSetId,
    /// Path of the point JSON, relative to the data root.
    pub points: String,
    /// Static coloring rule.
    #[serde(default)]
    pub default_coloring: DefaultColoring,
}

/// Where point sets, fields and the catalogue live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Data", inline)]
#[serde(default)]
pub struct DataOptions {
    /// Newline-delimited field identifier list.
    pub catalogue: String,
    /// Field payload path; `{id}` is replaced by the field identifier.
    pub field_template: String,
    /// Thumbnail image path; `{id}` is replaced by the field identifier.
    pub thumbnail_template: String,
    /// Tiles in display order (tile 0 first).
    pub tiles: Vec<TileSource>,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self {
            catalogue: "cells.txt".to_owned(),
            field_template: "rates/{id}.bin".to_owned(),
            thumbnail_template: "thumbnails/{id}.png".to_owned(),
            tiles: vec![
                TileSource {
                    id: "torus".into(),
                    points: "points.json".to_owned(),
                    default_coloring: DefaultColoring::default(),
                },
                TileSource {
                    id: "umap".into(),
                    points: "points_umap.json".to_owned(),
                    default_coloring: DefaultColoring::FromPointSet {
                        source: "torus".into(),
                        axis: Axis::Y,
                        lo: -4.0,
                        hi: 4.0,
                    },
                },
            ],
        }
    }
}

impl DataOptions {
    /// Relative path of a field payload.
    #[must_use]
    pub fn field_path(&self, id: &FieldId) -> String {
        self.field_template.replace("{id}", id.as_str())
    }

    /// Relative path of a field's thumbnail.
    #[must_use]
    pub fn thumbnail_path(&self, id: &FieldId) -> String {
        self.thumbnail_template.replace("{id}", id.as_str())
    }

    /// Tile ids in display order.
    #[must_use]
    pub fn tile_ids(&self) -> Vec<PointSetId> {
        self.tiles.iter().map(|t| t.id.clone()).collect()
    }
}
