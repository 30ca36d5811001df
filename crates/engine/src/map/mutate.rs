use tracing::warn;

use crate::save::MapPersistence;

use super::model::TileMap;

/// Applies single-tile edits to a loaded map and mirrors each successful
/// edit into the archived document.
///
/// Both handles are optional so callers racing a map load need no guard:
/// an edit arriving before the map exists is dropped with a log line
/// instead of crashing the session.
pub struct TileMutator<'a> {
    map: Option<&'a mut TileMap>,
    persistence: Option<&'a MapPersistence>,
}

impl<'a> TileMutator<'a> {
    pub fn new(map: Option<&'a mut TileMap>, persistence: Option<&'a MapPersistence>) -> Self {
        Self { map, persistence }
    }

    /// Writes one cell in memory, then best-effort patches the archive.
    /// Returns whether the in-memory write happened; a persistence failure
    /// is logged and swallowed because the in-memory state stays
    /// authoritative for the running session.
    pub fn set_tile(&mut self, layer_name: &str, x: u32, y: u32, new_id: u32) -> bool {
        let Some(map) = self.map.as_deref_mut() else {
            warn!(layer = layer_name, x, y, new_id, "tile_edit_dropped_no_map");
            return false;
        };
        let Some(layer) = map.layer_mut(layer_name) else {
            warn!(
                layer = layer_name,
                x, y, new_id, "tile_edit_dropped_unknown_layer"
            );
            return false;
        };
        let row_width = layer.width();
        if !layer.set_tile(x, y, new_id) {
            warn!(
                layer = layer_name,
                x,
                y,
                width = layer.width(),
                height = layer.height(),
                "tile_edit_out_of_bounds"
            );
            return false;
        }

        if let Some(persistence) = self.persistence {
            if let Err(error) = persistence.patch_tile(x, y, new_id, row_width) {
                warn!(
                    layer = layer_name,
                    x,
                    y,
                    new_id,
                    error = %error,
                    "tile_patch_failed_memory_only"
                );
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::save::SaveArchive;

    use super::super::document::parse_map_document;
    use super::*;

    const AREA_DOCUMENT: &str = r#"<map width="2" height="2" tilewidth="16" tileheight="16">
 <layer name="ground" width="2" height="2">
  <data encoding="csv">
1,2,
3,4
  </data>
 </layer>
</map>
"#;

    fn area_map() -> TileMap {
        parse_map_document(AREA_DOCUMENT).expect("parse")
    }

    #[test]
    fn edit_before_map_load_is_dropped() {
        let mut mutator = TileMutator::new(None, None);
        assert!(!mutator.set_tile("ground", 0, 0, 9));
    }

    #[test]
    fn edit_on_unknown_layer_is_dropped() {
        let mut map = area_map();
        let mut mutator = TileMutator::new(Some(&mut map), None);
        assert!(!mutator.set_tile("canopy", 0, 0, 9));
        assert_eq!(map.tile_at("ground", 0, 0), Some(1));
    }

    #[test]
    fn out_of_bounds_edit_leaves_the_tile_array_unchanged() {
        let mut map = area_map();
        let before = map.layer("ground").expect("layer").tiles().to_vec();
        let mut mutator = TileMutator::new(Some(&mut map), None);

        assert!(!mutator.set_tile("ground", 2, 0, 9));
        assert!(!mutator.set_tile("ground", 0, 5, 9));

        assert_eq!(
            map.layer("ground").expect("layer").tiles(),
            before.as_slice()
        );
    }

    #[test]
    fn in_memory_edit_succeeds_without_persistence() {
        let mut map = area_map();
        let mut mutator = TileMutator::new(Some(&mut map), None);
        assert!(mutator.set_tile("ground", 1, 1, 9));
        assert_eq!(map.tile_at("ground", 1, 1), Some(9));
    }

    #[test]
    fn successful_edit_patches_the_archived_document() {
        let dir = TempDir::new().expect("temp dir");
        let archive = SaveArchive::new(dir.path().join("slot_0.save"));
        archive
            .write_entries(&std::collections::BTreeMap::new())
            .expect("create archive");
        let persistence = MapPersistence::new(archive, "farm");
        persistence.write_document(AREA_DOCUMENT).expect("seed");

        let mut map = area_map();
        let mut mutator = TileMutator::new(Some(&mut map), Some(&persistence));
        assert!(mutator.set_tile("ground", 1, 0, 9));

        let stored = persistence.read_document().expect("read");
        assert!(stored.contains("1,9,\n3,4"), "got: {stored}");
    }

    #[test]
    fn persistence_failure_keeps_the_in_memory_write() {
        let dir = TempDir::new().expect("temp dir");
        // No archive file exists at this path; every patch attempt fails.
        let persistence =
            MapPersistence::new(SaveArchive::new(dir.path().join("missing.save")), "farm");

        let mut map = area_map();
        let mut mutator = TileMutator::new(Some(&mut map), Some(&persistence));
        assert!(mutator.set_tile("ground", 0, 0, 9));
        assert_eq!(map.tile_at("ground", 0, 0), Some(9));
    }
}
