mod atlas;
pub(crate) mod codec;
mod document;
mod model;
mod mutate;
mod passability;
mod textures;

pub use atlas::TileRegion;
pub use codec::{
    decode_layer_data, encode_csv_layer, DecodedLayer, LayerCompression, LayerEncoding,
    TileDataError, FLIP_DIAGONAL, FLIP_HORIZONTAL, FLIP_VERTICAL,
};
pub use document::{
    load_map, load_map_from_str, parse_map_document, MapErrorCode, MapFormatError, MapLoadError,
    SourceLocation,
};
pub use model::{MapObject, MapShapeError, ObjectGroup, Orientation, TileLayer, TileMap, Tileset};
pub use mutate::TileMutator;
pub use passability::PassableSet;
pub use textures::{Texture, TextureCache, TextureError};
