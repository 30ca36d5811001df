use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use thiserror::Error;

use super::codec::{decode_layer_data, LayerCompression, LayerEncoding};
use super::model::{MapObject, ObjectGroup, Orientation, TileLayer, TileMap, Tileset};
use super::textures::{TextureCache, TextureError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapErrorCode {
    XmlMalformed,
    InvalidRoot,
    MissingAttribute,
    InvalidAttribute,
    MissingElement,
    UnknownEncoding,
    UnknownCompression,
    TileData,
    LayerShape,
}

#[derive(Debug, Clone)]
pub struct MapFormatError {
    pub code: MapErrorCode,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for MapFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (line={}, column={})",
                self.code, self.message, loc.line, loc.column
            ),
            None => write!(f, "{:?}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for MapFormatError {}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read map {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Format(#[from] MapFormatError),
    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// Reads and parses a map file, resolving tileset images relative to the
/// file's directory through the cache.
pub fn load_map(path: &Path, textures: &mut TextureCache) -> Result<TileMap, MapLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load_map_from_str(&raw, base_dir, textures)
}

/// Parses map text that did not come from a file on disk (an archived
/// document, a fixture). Tileset images still live under `base_dir`.
pub fn load_map_from_str(
    raw: &str,
    base_dir: &Path,
    textures: &mut TextureCache,
) -> Result<TileMap, MapLoadError> {
    let mut map = parse_map_document(raw)?;
    resolve_tileset_textures(&mut map, base_dir, textures)?;
    Ok(map)
}

fn resolve_tileset_textures(
    map: &mut TileMap,
    base_dir: &Path,
    textures: &mut TextureCache,
) -> Result<(), TextureError> {
    for tileset in map.tilesets_mut() {
        let Some(source) = tileset.image_source.clone() else {
            continue;
        };
        let path = base_dir.join(&source);
        tileset.texture = Some(textures.load(&path)?);
    }
    Ok(())
}

/// Parses a map document into the in-memory model without touching the
/// filesystem. Tileset textures stay unresolved.
pub fn parse_map_document(raw: &str) -> Result<TileMap, MapFormatError> {
    let doc = Document::parse(raw).map_err(|error| MapFormatError {
        code: MapErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(error_at_node(
            MapErrorCode::InvalidRoot,
            format!(
                "root element must be <map>, found <{}>",
                root.tag_name().name()
            ),
            &doc,
            root,
        ));
    }

    let width = required_u32(&doc, root, "width")?;
    let height = required_u32(&doc, root, "height")?;
    let tile_width = required_u32(&doc, root, "tilewidth")?;
    let tile_height = required_u32(&doc, root, "tileheight")?;
    let orientation = parse_orientation(&doc, root)?;

    let mut tilesets = Vec::<Tileset>::new();
    let mut layers = Vec::<TileLayer>::new();
    let mut object_groups = Vec::<ObjectGroup>::new();
    let mut properties = BTreeMap::<String, String>::new();

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "tileset" => tilesets.push(parse_tileset(&doc, child)?),
            "layer" => layers.push(parse_layer(&doc, child, width, height)?),
            "objectgroup" => object_groups.push(parse_object_group(&doc, child)?),
            "properties" => parse_properties(&doc, child, &mut properties)?,
            // Editor bookkeeping elements are not part of the model.
            _ => {}
        }
    }

    TileMap::new(
        width,
        height,
        tile_width,
        tile_height,
        orientation,
        tilesets,
        layers,
        object_groups,
        properties,
    )
    .map_err(|error| error_at_node(MapErrorCode::LayerShape, error.to_string(), &doc, root))
}

fn parse_orientation(doc: &Document<'_>, root: Node<'_, '_>) -> Result<Orientation, MapFormatError> {
    match root.attribute("orientation") {
        None => Ok(Orientation::Orthogonal),
        Some("orthogonal") => Ok(Orientation::Orthogonal),
        Some("isometric") => Ok(Orientation::Isometric),
        Some(other) => Err(error_at_node(
            MapErrorCode::InvalidAttribute,
            format!("unsupported orientation '{other}'; allowed values: orthogonal, isometric"),
            doc,
            root,
        )),
    }
}

fn parse_tileset(doc: &Document<'_>, node: Node<'_, '_>) -> Result<Tileset, MapFormatError> {
    if node.attribute("source").is_some() {
        return Err(error_at_node(
            MapErrorCode::InvalidAttribute,
            "external tileset references are not supported; embed the tileset".to_string(),
            doc,
            node,
        ));
    }

    let first_tile_id = required_u32(doc, node, "firstgid")?;
    let name = node.attribute("name").unwrap_or_default().to_string();
    let tile_width = required_u32(doc, node, "tilewidth")?;
    let tile_height = required_u32(doc, node, "tileheight")?;
    let margin = optional_u32(doc, node, "margin", 0)?;
    let spacing = optional_u32(doc, node, "spacing", 0)?;

    let mut image_source = None;
    let mut image_width = 0;
    let mut image_height = 0;
    let mut tile_properties = BTreeMap::<u32, BTreeMap<String, String>>::new();
    for child in node.children().filter(|child| child.is_element()) {
        match child.tag_name().name() {
            "image" => {
                let source = child.attribute("source").ok_or_else(|| {
                    error_at_node(
                        MapErrorCode::MissingAttribute,
                        "<image> element requires a source attribute".to_string(),
                        doc,
                        child,
                    )
                })?;
                image_source = Some(source.to_string());
                image_width = optional_u32(doc, child, "width", 0)?;
                image_height = optional_u32(doc, child, "height", 0)?;
            }
            "tile" => {
                let local_id = required_u32(doc, child, "id")?;
                // An id with no properties still registers an empty entry.
                let entry = tile_properties.entry(local_id).or_default();
                if let Some(props) = child
                    .children()
                    .find(|inner| inner.is_element() && inner.tag_name().name() == "properties")
                {
                    parse_properties(doc, props, entry)?;
                }
            }
            _ => {}
        }
    }

    Ok(Tileset {
        first_tile_id,
        name,
        tile_width,
        tile_height,
        margin,
        spacing,
        image_source,
        image_width,
        image_height,
        texture: None,
        tile_properties,
    })
}

fn parse_layer(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    map_width: u32,
    map_height: u32,
) -> Result<TileLayer, MapFormatError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let width = optional_u32(doc, node, "width", map_width)?;
    let height = optional_u32(doc, node, "height", map_height)?;
    let opacity = optional_f32(doc, node, "opacity", 1.0)?;

    let data = node
        .children()
        .find(|child| child.is_element() && child.tag_name().name() == "data")
        .ok_or_else(|| {
            error_at_node(
                MapErrorCode::MissingElement,
                format!("layer {name:?} has no <data> element"),
                doc,
                node,
            )
        })?;

    let (encoding, compression) = parse_data_format(doc, data)?;
    let text = data.text().unwrap_or_default();
    let decoded = decode_layer_data(encoding, compression, text)
        .map_err(|error| error_at_node(MapErrorCode::TileData, error.to_string(), doc, data))?;

    TileLayer::new(name, width, height, opacity, decoded)
        .map_err(|error| error_at_node(MapErrorCode::LayerShape, error.to_string(), doc, node))
}

fn parse_data_format(
    doc: &Document<'_>,
    data: Node<'_, '_>,
) -> Result<(LayerEncoding, LayerCompression), MapFormatError> {
    let encoding = match data.attribute("encoding") {
        Some("csv") => LayerEncoding::Csv,
        Some("base64") => LayerEncoding::Base64,
        Some(other) => {
            return Err(error_at_node(
                MapErrorCode::UnknownEncoding,
                format!("unsupported layer encoding '{other}'; allowed values: csv, base64"),
                doc,
                data,
            ))
        }
        None => {
            return Err(error_at_node(
                MapErrorCode::UnknownEncoding,
                "layer <data> without an encoding attribute is not supported".to_string(),
                doc,
                data,
            ))
        }
    };

    let compression = match data.attribute("compression") {
        None => LayerCompression::None,
        Some("gzip") => LayerCompression::Gzip,
        Some("zlib") => LayerCompression::Zlib,
        Some(other) => {
            return Err(error_at_node(
                MapErrorCode::UnknownCompression,
                format!("unsupported layer compression '{other}'; allowed values: gzip, zlib"),
                doc,
                data,
            ))
        }
    };

    if encoding == LayerEncoding::Csv && compression != LayerCompression::None {
        return Err(error_at_node(
            MapErrorCode::InvalidAttribute,
            "csv layer data cannot carry a compression attribute".to_string(),
            doc,
            data,
        ));
    }

    Ok((encoding, compression))
}

fn parse_object_group(
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<ObjectGroup, MapFormatError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let mut objects = Vec::<MapObject>::new();
    for child in node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "object")
    {
        objects.push(parse_object(doc, child)?);
    }
    Ok(ObjectGroup { name, objects })
}

fn parse_object(doc: &Document<'_>, node: Node<'_, '_>) -> Result<MapObject, MapFormatError> {
    let id = optional_u32(doc, node, "id", 0)?;
    let name = node.attribute("name").unwrap_or_default().to_string();
    // Newer editors write the object class under `class`, older ones `type`.
    let kind = node
        .attribute("type")
        .or_else(|| node.attribute("class"))
        .unwrap_or_default()
        .to_string();
    let x = required_f32(doc, node, "x")?;
    let y = required_f32(doc, node, "y")?;
    let width = optional_f32(doc, node, "width", 0.0)?;
    let height = optional_f32(doc, node, "height", 0.0)?;

    let mut properties = BTreeMap::<String, String>::new();
    if let Some(props) = node
        .children()
        .find(|child| child.is_element() && child.tag_name().name() == "properties")
    {
        parse_properties(doc, props, &mut properties)?;
    }

    Ok(MapObject {
        id,
        name,
        kind,
        x,
        y,
        width,
        height,
        properties,
    })
}

fn parse_properties(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    out: &mut BTreeMap<String, String>,
) -> Result<(), MapFormatError> {
    for property in node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "property")
    {
        let name = property.attribute("name").ok_or_else(|| {
            error_at_node(
                MapErrorCode::MissingAttribute,
                "<property> element requires a name attribute".to_string(),
                doc,
                property,
            )
        })?;
        // Multiline values are stored as element text instead of an attribute.
        let value = match property.attribute("value") {
            Some(value) => value.to_string(),
            None => property.text().unwrap_or_default().to_string(),
        };
        out.insert(name.to_string(), value);
    }
    Ok(())
}

fn required_u32(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<u32, MapFormatError> {
    let raw = required_attribute(doc, node, name)?;
    raw.parse::<u32>().map_err(|_| {
        error_at_node(
            MapErrorCode::InvalidAttribute,
            format!(
                "attribute {name}='{raw}' on <{}> is not a valid unsigned integer",
                node.tag_name().name()
            ),
            doc,
            node,
        )
    })
}

fn optional_u32(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
    default: u32,
) -> Result<u32, MapFormatError> {
    match node.attribute(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            error_at_node(
                MapErrorCode::InvalidAttribute,
                format!(
                    "attribute {name}='{raw}' on <{}> is not a valid unsigned integer",
                    node.tag_name().name()
                ),
                doc,
                node,
            )
        }),
    }
}

fn required_f32(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<f32, MapFormatError> {
    let raw = required_attribute(doc, node, name)?;
    parse_f32(doc, node, name, &raw)
}

fn optional_f32(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
    default: f32,
) -> Result<f32, MapFormatError> {
    match node.attribute(name) {
        None => Ok(default),
        Some(raw) => parse_f32(doc, node, name, raw),
    }
}

fn parse_f32(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
    raw: &str,
) -> Result<f32, MapFormatError> {
    let value = raw.parse::<f32>().map_err(|_| {
        error_at_node(
            MapErrorCode::InvalidAttribute,
            format!(
                "attribute {name}='{raw}' on <{}> is not a valid number",
                node.tag_name().name()
            ),
            doc,
            node,
        )
    })?;
    if !value.is_finite() {
        return Err(error_at_node(
            MapErrorCode::InvalidAttribute,
            format!("attribute {name}='{raw}' must be finite"),
            doc,
            node,
        ));
    }
    Ok(value)
}

fn required_attribute(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<String, MapFormatError> {
    node.attribute(name)
        .map(str::to_string)
        .ok_or_else(|| {
            error_at_node(
                MapErrorCode::MissingAttribute,
                format!(
                    "missing required attribute {name} on <{}>",
                    node.tag_name().name()
                ),
                doc,
                node,
            )
        })
}

fn error_at_node(
    code: MapErrorCode,
    message: String,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> MapFormatError {
    let pos = doc.text_pos_at(node.range().start);
    MapFormatError {
        code,
        message,
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use base64::prelude::BASE64_STANDARD;
    use base64::Engine;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    use super::super::codec::{FLIP_DIAGONAL, FLIP_HORIZONTAL};
    use super::*;

    const FARM_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="3" height="2" tilewidth="16" tileheight="16">
 <properties>
  <property name="passable" value="0,1,2"/>
  <property name="music" value="morning_theme"/>
 </properties>
 <tileset firstgid="1" name="farmland" tilewidth="16" tileheight="16" margin="2" spacing="1">
  <image source="farmland.png" width="137" height="137"/>
  <tile id="4">
   <properties>
    <property name="passable" value="true"/>
   </properties>
  </tile>
  <tile id="6"/>
 </tileset>
 <layer name="ground" width="3" height="2">
  <data encoding="csv">
1,2,3,
4,5,536870918
  </data>
 </layer>
 <objectgroup name="spawns">
  <object id="4" name="start" type="spawn" x="24.5" y="16">
   <properties>
    <property name="facing" value="south"/>
   </properties>
  </object>
 </objectgroup>
</map>
"#;

    #[test]
    fn parses_model_from_document() {
        let map = parse_map_document(FARM_FIXTURE).expect("parse");
        assert_eq!(map.width(), 3);
        assert_eq!(map.height(), 2);
        assert_eq!(map.tile_width(), 16);
        assert_eq!(map.orientation(), Orientation::Orthogonal);
        assert_eq!(map.properties().get("music").map(String::as_str), Some("morning_theme"));

        let tileset = &map.tilesets()[0];
        assert_eq!(tileset.first_tile_id, 1);
        assert_eq!(tileset.name, "farmland");
        assert_eq!(tileset.margin, 2);
        assert_eq!(tileset.spacing, 1);
        assert_eq!(tileset.image_source.as_deref(), Some("farmland.png"));
        assert_eq!(tileset.image_width, 137);
        assert!(tileset.texture.is_none());
        assert_eq!(tileset.tile_property(4, "passable"), Some("true"));
        // A <tile> without properties still registers, with an empty map.
        assert_eq!(
            tileset.tile_properties.get(&6),
            Some(&std::collections::BTreeMap::new())
        );

        let ground = map.layer("ground").expect("ground layer");
        assert_eq!(ground.tiles(), &[1, 2, 3, 4, 5, 6]);
        // 536870918 = 6 with the diagonal bit set.
        assert_eq!(ground.flip_at(2, 1), Some(FLIP_DIAGONAL));

        let spawns = &map.object_groups()[0];
        assert_eq!(spawns.name, "spawns");
        let start = &spawns.objects[0];
        assert_eq!(start.id, 4);
        assert_eq!(start.kind, "spawn");
        assert!((start.x - 24.5).abs() < f32::EPSILON);
        assert_eq!(
            start.properties.get("facing").map(String::as_str),
            Some("south")
        );
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = parse_map_document("<map width=\"1\"").unwrap_err();
        assert_eq!(err.code, MapErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn non_map_root_is_rejected() {
        let err = parse_map_document("<tileset/>").unwrap_err();
        assert_eq!(err.code, MapErrorCode::InvalidRoot);
    }

    #[test]
    fn missing_width_reports_attribute_and_location() {
        let err =
            parse_map_document(r#"<map height="2" tilewidth="16" tileheight="16"/>"#).unwrap_err();
        assert_eq!(err.code, MapErrorCode::MissingAttribute);
        assert!(err.message.contains("width"), "got: {}", err.message);
        assert!(err.location.is_some());
    }

    #[test]
    fn missing_orientation_defaults_to_orthogonal() {
        let map = parse_map_document(
            r#"<map width="1" height="1" tilewidth="16" tileheight="16"/>"#,
        )
        .expect("parse");
        assert_eq!(map.orientation(), Orientation::Orthogonal);
    }

    #[test]
    fn unsupported_orientation_is_rejected() {
        let err = parse_map_document(
            r#"<map orientation="hexagonal" width="1" height="1" tilewidth="16" tileheight="16"/>"#,
        )
        .unwrap_err();
        assert_eq!(err.code, MapErrorCode::InvalidAttribute);
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let err = parse_map_document(
            r#"<map width="1" height="1" tilewidth="16" tileheight="16">
 <layer name="ground" width="1" height="1"><data encoding="hex">00</data></layer>
</map>"#,
        )
        .unwrap_err();
        assert_eq!(err.code, MapErrorCode::UnknownEncoding);
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let err = parse_map_document(
            r#"<map width="1" height="1" tilewidth="16" tileheight="16">
 <layer name="ground" width="1" height="1"><data encoding="base64" compression="zstd">AAAAAA==</data></layer>
</map>"#,
        )
        .unwrap_err();
        assert_eq!(err.code, MapErrorCode::UnknownCompression);
    }

    #[test]
    fn csv_with_compression_is_rejected() {
        let err = parse_map_document(
            r#"<map width="1" height="1" tilewidth="16" tileheight="16">
 <layer name="ground" width="1" height="1"><data encoding="csv" compression="gzip">1</data></layer>
</map>"#,
        )
        .unwrap_err();
        assert_eq!(err.code, MapErrorCode::InvalidAttribute);
    }

    #[test]
    fn bad_tile_token_reports_data_location() {
        let err = parse_map_document(
            r#"<map width="2" height="1" tilewidth="16" tileheight="16">
 <layer name="ground" width="2" height="1"><data encoding="csv">1,boom</data></layer>
</map>"#,
        )
        .unwrap_err();
        assert_eq!(err.code, MapErrorCode::TileData);
        assert!(err.message.contains("boom"), "got: {}", err.message);
        assert!(err.location.is_some());
    }

    #[test]
    fn layer_with_wrong_cell_count_is_rejected() {
        let err = parse_map_document(
            r#"<map width="2" height="2" tilewidth="16" tileheight="16">
 <layer name="ground" width="2" height="2"><data encoding="csv">1,2,3</data></layer>
</map>"#,
        )
        .unwrap_err();
        assert_eq!(err.code, MapErrorCode::LayerShape);
    }

    #[test]
    fn layer_without_data_is_rejected() {
        let err = parse_map_document(
            r#"<map width="1" height="1" tilewidth="16" tileheight="16">
 <layer name="ground" width="1" height="1"/>
</map>"#,
        )
        .unwrap_err();
        assert_eq!(err.code, MapErrorCode::MissingElement);
    }

    #[test]
    fn external_tileset_is_rejected() {
        let err = parse_map_document(
            r#"<map width="1" height="1" tilewidth="16" tileheight="16">
 <tileset firstgid="1" source="farmland.tsx"/>
</map>"#,
        )
        .unwrap_err();
        assert_eq!(err.code, MapErrorCode::InvalidAttribute);
    }

    #[test]
    fn compressed_base64_layer_parses_through_attribute_wiring() {
        let words: Vec<u8> = [1u32, 0x8000_0002, 3, 4]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&words).unwrap();
        let payload = BASE64_STANDARD.encode(encoder.finish().unwrap());

        let raw = format!(
            r#"<map width="2" height="2" tilewidth="16" tileheight="16">
 <layer name="ground" width="2" height="2">
  <data encoding="base64" compression="gzip">
   {payload}
  </data>
 </layer>
</map>"#
        );
        let map = parse_map_document(&raw).expect("parse");
        let ground = map.layer("ground").expect("layer");
        assert_eq!(ground.tiles(), &[1, 2, 3, 4]);
        assert_eq!(ground.flip_at(1, 0), Some(FLIP_HORIZONTAL));
    }

    #[test]
    fn load_map_resolves_tileset_textures() {
        let dir = TempDir::new().expect("temp dir");
        image::RgbaImage::new(64, 32)
            .save(dir.path().join("farmland.png"))
            .expect("write png");
        let map_path = dir.path().join("farm.tmx");
        std::fs::write(&map_path, FARM_FIXTURE).expect("write map");

        let mut textures = TextureCache::new();
        let map = load_map(&map_path, &mut textures).expect("load");
        let texture = map.tilesets()[0].texture.as_ref().expect("texture");
        assert_eq!((texture.width, texture.height), (64, 32));
        assert_eq!(textures.len(), 1);
    }

    #[test]
    fn load_map_missing_file_reports_read_error() {
        let dir = TempDir::new().expect("temp dir");
        let mut textures = TextureCache::new();
        let err = load_map(&dir.path().join("absent.tmx"), &mut textures).unwrap_err();
        assert!(matches!(err, MapLoadError::Read { .. }));
    }
}
