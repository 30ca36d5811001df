#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemUseOutcome {
    TileChanged { new_tile: u32 },
    Planted { plant: PlantId },
    Watered,
    Harvested { crop: PlantId },
    NoEffect,
}

/// A loaded area: the tile map, its walkability set, the plant overlay, and
/// (for persistent areas) the archive hookup that keeps tile edits durable.
struct AreaScreen {
    area: AreaId,
    map: TileMap,
    passable: PassableSet,
    persistence: Option<MapPersistence>,
    plants: PlantOverlay,
}

impl AreaScreen {
    /// Loads the area, preferring the archived map entry for persistent
    /// areas. A missing entry is the normal first visit; an unreadable one
    /// is logged and the pristine asset is used instead, so a corrupt save
    /// never blocks entering the farm.
    fn enter(
        paths: &AppPaths,
        archive: &SaveArchive,
        textures: &mut TextureCache,
        area: AreaId,
        day: u32,
    ) -> Result<Self, String> {
        let persistence = area
            .is_persistent()
            .then(|| MapPersistence::new(archive.clone(), area.key()));

        let map = match &persistence {
            Some(persistence) => match persistence.read_document() {
                Ok(document) => {
                    match load_map_from_str(&document, &paths.maps_dir(), textures) {
                        Ok(map) => map,
                        Err(error) => {
                            warn!(
                                area = area.key(),
                                error = %error,
                                "archived_map_unreadable_using_default"
                            );
                            load_pristine_map(paths, textures, area)?
                        }
                    }
                }
                Err(PatchError::Archive(ArchiveError::EntryMissing { .. })) => {
                    debug!(area = area.key(), "no_archived_map_entry");
                    load_pristine_map(paths, textures, area)?
                }
                Err(error) => {
                    warn!(
                        area = area.key(),
                        error = %error,
                        "archived_map_unreadable_using_default"
                    );
                    load_pristine_map(paths, textures, area)?
                }
            },
            None => load_pristine_map(paths, textures, area)?,
        };

        let passable = passable_set_for(&map);
        let plants = PlantOverlay::from_map(&map, day);
        Ok(Self {
            area,
            map,
            passable,
            persistence,
            plants,
        })
    }

    fn area(&self) -> AreaId {
        self.area
    }

    fn map(&self) -> &TileMap {
        &self.map
    }

    fn tile_at(&self, x: u32, y: u32) -> Option<u32> {
        self.map.tile_at(GROUND_LAYER, x, y)
    }

    fn set_tile(&mut self, x: u32, y: u32, tile_id: u32) -> bool {
        let mut mutator = TileMutator::new(Some(&mut self.map), self.persistence.as_ref());
        mutator.set_tile(GROUND_LAYER, x, y, tile_id)
    }

    /// Coordinate-level walkability: out-of-bounds is never walkable.
    fn is_passable(&self, x: u32, y: u32) -> bool {
        self.tile_at(x, y).map_or(false, |tile_id| self.passable.is_passable(tile_id))
    }

    fn region_for_tile(&self, tile_id: u32) -> Option<(&Tileset, TileRegion)> {
        self.map.region_for_tile(tile_id)
    }

    fn use_item(&mut self, item: &ItemKind, x: u32, y: u32, day: u32) -> ItemUseOutcome {
        let Some(current) = self.tile_at(x, y) else {
            debug!(x, y, "item_use_outside_map");
            return ItemUseOutcome::NoEffect;
        };

        // Watering a growing plant marks the plot, the ground tile stays.
        if matches!(item, ItemKind::Tool(ToolKind::WateringCan))
            && plant_for_tile(current).is_some()
        {
            self.plants.water(x, y);
            return ItemUseOutcome::Watered;
        }

        let Some(next) = tile_after_item_use(item, current) else {
            return ItemUseOutcome::NoEffect;
        };
        if !self.set_tile(x, y, next) {
            return ItemUseOutcome::NoEffect;
        }

        match item {
            ItemKind::Seed(plant) => {
                // Sowing into wet ground counts as watered on day one.
                self.plants.register(x, y, *plant, day, current == TILE_TILLED_WET);
                ItemUseOutcome::Planted { plant: *plant }
            }
            ItemKind::Tool(ToolKind::Scythe) => match plant_for_tile(current) {
                Some((plant, _)) => {
                    if let Some(plot) = self.plants.remove(x, y) {
                        debug!(
                            plant = ?plot.plant,
                            planted_day = plot.planted_day,
                            "plot_cleared"
                        );
                    }
                    ItemUseOutcome::Harvested { crop: plant }
                }
                None => ItemUseOutcome::TileChanged { new_tile: next },
            },
            ItemKind::Tool(ToolKind::WateringCan) => ItemUseOutcome::Watered,
            _ => ItemUseOutcome::TileChanged { new_tile: next },
        }
    }

    /// Advances every watered plant one growth stage by rewriting its ground
    /// tile (mature plants hold), then leaves all plots dry for the new day.
    /// Returns how many plots actually advanced.
    fn morning_tick(&mut self) -> usize {
        let mut advanced = 0;
        for (x, y) in self.plants.take_watered() {
            let Some(current) = self.tile_at(x, y) else {
                self.plants.remove(x, y);
                continue;
            };
            let Some((plant, stage)) = plant_for_tile(current) else {
                self.plants.remove(x, y);
                continue;
            };
            let stage_tiles = growth_for(plant).stage_tiles;
            let Some(next_tile) = stage_tiles.get(stage + 1) else {
                continue;
            };
            if self.set_tile(x, y, *next_tile) {
                advanced += 1;
            }
        }
        advanced
    }

    #[cfg(test)]
    fn plants(&self) -> &PlantOverlay {
        &self.plants
    }
}

fn load_pristine_map(
    paths: &AppPaths,
    textures: &mut TextureCache,
    area: AreaId,
) -> Result<TileMap, String> {
    let path = paths.maps_dir().join(format!("{}.tmx", area.key()));
    load_map(&path, textures).map_err(|error| format!("load map '{}': {error}", path.display()))
}

/// Walkable ids come from the map-level `passable` property; tilesets can
/// opt individual tiles in through a per-tile `passable=true` property
/// (crops are walkable this way without listing every stage id on the map).
fn passable_set_for(map: &TileMap) -> PassableSet {
    let mut passable = map
        .properties()
        .get(PASSABLE_PROPERTY)
        .map(|raw| PassableSet::from_id_list(raw))
        .unwrap_or_else(PassableSet::new);
    for tileset in map.tilesets() {
        for (local_id, properties) in &tileset.tile_properties {
            if properties.get(PASSABLE_PROPERTY).map(String::as_str) == Some("true") {
                passable.insert(tileset.first_tile_id + local_id);
            }
        }
    }
    passable
}
