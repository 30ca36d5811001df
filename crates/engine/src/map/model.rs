use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use super::codec::DecodedLayer;
use super::textures::Texture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Orthogonal,
    Isometric,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapShapeError {
    #[error("layer {layer:?} tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error("layer {layer:?} has {flags} flip flags for {tiles} tiles")]
    FlagCountMismatch {
        layer: String,
        tiles: usize,
        flags: usize,
    },
    #[error(
        "layer {layer:?} is {layer_width}x{layer_height} but the map is {map_width}x{map_height}"
    )]
    LayerExtentMismatch {
        layer: String,
        map_width: u32,
        map_height: u32,
        layer_width: u32,
        layer_height: u32,
    },
}

/// One tile layer, row-major from the top-left corner. `tiles` holds ids
/// with orientation bits already cleared; `flip_flags` is index-parallel.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    name: String,
    width: u32,
    height: u32,
    opacity: f32,
    tiles: Vec<u32>,
    flip_flags: Vec<u8>,
}

impl TileLayer {
    pub fn new(
        name: String,
        width: u32,
        height: u32,
        opacity: f32,
        decoded: DecodedLayer,
    ) -> Result<Self, MapShapeError> {
        let expected = width as usize * height as usize;
        let actual = decoded.tiles.len();
        if expected != actual {
            return Err(MapShapeError::TileCountMismatch {
                layer: name,
                expected,
                actual,
            });
        }
        if decoded.flip_flags.len() != actual {
            return Err(MapShapeError::FlagCountMismatch {
                layer: name,
                tiles: actual,
                flags: decoded.flip_flags.len(),
            });
        }
        Ok(Self {
            name,
            width,
            height,
            opacity,
            tiles: decoded.tiles,
            flip_flags: decoded.flip_flags,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn tiles(&self) -> &[u32] {
        &self.tiles
    }

    pub fn flip_flags(&self) -> &[u8] {
        &self.flip_flags
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<u32> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn flip_at(&self, x: u32, y: u32) -> Option<u8> {
        self.index_of(x, y)
            .and_then(|index| self.flip_flags.get(index).copied())
    }

    /// Overwrites one cell, returning false without touching the arrays
    /// when the coordinate is outside the layer. A replacement tile does
    /// not inherit the old cell's orientation.
    pub fn set_tile(&mut self, x: u32, y: u32, tile_id: u32) -> bool {
        match self.index_of(x, y) {
            Some(index) => {
                self.tiles[index] = tile_id;
                self.flip_flags[index] = 0;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tileset {
    pub first_tile_id: u32,
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub margin: u32,
    pub spacing: u32,
    pub image_source: Option<String>,
    /// Dimensions declared on the `<image>` element, 0 when absent.
    pub image_width: u32,
    pub image_height: u32,
    pub texture: Option<Arc<Texture>>,
    /// Properties keyed by tileset-local id. A `<tile>` element with no
    /// properties still gets an entry with an empty map.
    pub tile_properties: BTreeMap<u32, BTreeMap<String, String>>,
}

impl Tileset {
    pub fn tile_property(&self, local_id: u32, name: &str) -> Option<&str> {
        self.tile_properties
            .get(&local_id)
            .and_then(|properties| properties.get(name))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGroup {
    pub name: String,
    pub objects: Vec<MapObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct TileMap {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    orientation: Orientation,
    tilesets: Vec<Tileset>,
    layers: Vec<TileLayer>,
    object_groups: Vec<ObjectGroup>,
    properties: BTreeMap<String, String>,
}

impl TileMap {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        orientation: Orientation,
        tilesets: Vec<Tileset>,
        layers: Vec<TileLayer>,
        object_groups: Vec<ObjectGroup>,
        properties: BTreeMap<String, String>,
    ) -> Result<Self, MapShapeError> {
        for layer in &layers {
            if layer.width() != width || layer.height() != height {
                return Err(MapShapeError::LayerExtentMismatch {
                    layer: layer.name().to_string(),
                    map_width: width,
                    map_height: height,
                    layer_width: layer.width(),
                    layer_height: layer.height(),
                });
            }
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            orientation,
            tilesets,
            layers,
            object_groups,
            properties,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn tilesets(&self) -> &[Tileset] {
        &self.tilesets
    }

    pub(crate) fn tilesets_mut(&mut self) -> &mut [Tileset] {
        &mut self.tilesets
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&TileLayer> {
        self.layers.iter().find(|layer| layer.name() == name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut TileLayer> {
        self.layers.iter_mut().find(|layer| layer.name() == name)
    }

    pub fn object_groups(&self) -> &[ObjectGroup] {
        &self.object_groups
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn tile_at(&self, layer_name: &str, x: u32, y: u32) -> Option<u32> {
        self.layer(layer_name)?.tile_at(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_layer(name: &str, width: u32, height: u32) -> TileLayer {
        let count = (width * height) as usize;
        TileLayer::new(
            name.to_string(),
            width,
            height,
            1.0,
            DecodedLayer {
                tiles: vec![1; count],
                flip_flags: vec![0; count],
            },
        )
        .unwrap()
    }

    #[test]
    fn layer_rejects_wrong_tile_count() {
        let err = TileLayer::new(
            "ground".to_string(),
            3,
            2,
            1.0,
            DecodedLayer {
                tiles: vec![0; 5],
                flip_flags: vec![0; 5],
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            MapShapeError::TileCountMismatch {
                layer: "ground".to_string(),
                expected: 6,
                actual: 5,
            }
        );
    }

    #[test]
    fn layer_reads_row_major_from_top_left() {
        let layer = TileLayer::new(
            "ground".to_string(),
            2,
            2,
            1.0,
            DecodedLayer {
                tiles: vec![10, 11, 12, 13],
                flip_flags: vec![0; 4],
            },
        )
        .unwrap();
        assert_eq!(layer.tile_at(1, 0), Some(11));
        assert_eq!(layer.tile_at(0, 1), Some(12));
        assert_eq!(layer.tile_at(2, 0), None);
    }

    #[test]
    fn set_tile_out_of_bounds_leaves_tiles_untouched() {
        let mut layer = filled_layer("ground", 2, 2);
        let before = layer.tiles().to_vec();
        assert!(!layer.set_tile(2, 0, 99));
        assert!(!layer.set_tile(0, 2, 99));
        assert_eq!(layer.tiles(), before.as_slice());
    }

    #[test]
    fn set_tile_clears_the_cell_flip_flags() {
        let mut layer = TileLayer::new(
            "ground".to_string(),
            1,
            1,
            1.0,
            DecodedLayer {
                tiles: vec![4],
                flip_flags: vec![super::super::codec::FLIP_DIAGONAL],
            },
        )
        .unwrap();
        assert!(layer.set_tile(0, 0, 9));
        assert_eq!(layer.tile_at(0, 0), Some(9));
        assert_eq!(layer.flip_at(0, 0), Some(0));
    }

    #[test]
    fn map_rejects_layer_extent_mismatch() {
        let err = TileMap::new(
            3,
            3,
            16,
            16,
            Orientation::Orthogonal,
            Vec::new(),
            vec![filled_layer("ground", 2, 2)],
            Vec::new(),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, MapShapeError::LayerExtentMismatch { .. }));
    }
}
