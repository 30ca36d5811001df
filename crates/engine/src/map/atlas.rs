use super::model::{TileMap, Tileset};

/// Pixel rectangle inside a tileset image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tileset {
    /// Image dimensions used for region math: the decoded texture when one
    /// is attached, otherwise the dimensions declared in the document.
    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        if let Some(texture) = &self.texture {
            return Some((texture.width, texture.height));
        }
        if self.image_width > 0 && self.image_height > 0 {
            return Some((self.image_width, self.image_height));
        }
        None
    }

    /// Maps a global tile id to this tileset's source rectangle, or None
    /// when the id is below `first_tile_id` or lands past the image's rows.
    pub fn region_for(&self, tile_id: u32) -> Option<TileRegion> {
        if tile_id < self.first_tile_id {
            return None;
        }
        let (image_width, image_height) = self.image_dimensions()?;
        let cell_width = self.tile_width + self.spacing;
        let cell_height = self.tile_height + self.spacing;
        if cell_width == 0 || cell_height == 0 {
            return None;
        }
        let columns = image_width / cell_width;
        if columns == 0 {
            return None;
        }
        let rows = image_height / cell_height;
        let local = tile_id - self.first_tile_id;
        let row = local / columns;
        if row >= rows {
            return None;
        }
        let col = local % columns;
        Some(TileRegion {
            x: col * cell_width + self.margin,
            y: row * cell_height + self.margin,
            width: self.tile_width,
            height: self.tile_height,
        })
    }
}

impl TileMap {
    /// Resolves a global tile id against the map's tilesets in declared
    /// order; the first tileset producing an in-bounds region wins. No
    /// tile counts are declared, so ranges can overlap and declared order
    /// decides. Every call is an independent scan from the first tileset.
    pub fn region_for_tile(&self, tile_id: u32) -> Option<(&Tileset, TileRegion)> {
        self.tilesets()
            .iter()
            .find_map(|tileset| tileset.region_for(tile_id).map(|region| (tileset, region)))
    }
}
