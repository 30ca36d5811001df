use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;

use engine::{
    load_map, load_map_from_str, resolve_app_paths, AppPaths, ArchiveError, MapObject,
    MapPersistence, PassableSet, PatchError, SaveArchive, TextureCache, TileMap, TileMutator,
    TileRegion, Tileset, PLAYER_ENTRY, TIME_ENTRY,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const GROUND_LAYER: &str = "ground";
const PASSABLE_PROPERTY: &str = "passable";
const SPAWN_OBJECT_KIND: &str = "spawn";
const DEFAULT_PLAYER_NAME: &str = "Fern";
const STARTING_CURRENCY: u32 = 500;
const DAY_START_HOUR: u8 = 6;
const TILE_GRASS: u32 = 1;
const TILE_SOIL: u32 = 2;
const TILE_TILLED: u32 = 3;
const TILE_TILLED_WET: u32 = 4;
const TURNIP_STAGE_TILES: [u32; 3] = [9, 10, 11];
const POTATO_STAGE_TILES: [u32; 4] = [17, 18, 19, 20];
const TURNIP_CROP_VALUE: u32 = 35;
const POTATO_CROP_VALUE: u32 = 60;
const VILLAGE_PROBE: (u32, u32) = (5, 4);

const DAY_CHORES: [(ItemKind, u32, u32); 8] = [
    (ItemKind::Tool(ToolKind::Hoe), 3, 3),
    (ItemKind::Seed(PlantId::Turnip), 3, 3),
    (ItemKind::Tool(ToolKind::WateringCan), 3, 3),
    (ItemKind::Tool(ToolKind::Hoe), 4, 3),
    (ItemKind::Tool(ToolKind::WateringCan), 4, 3),
    (ItemKind::Seed(PlantId::Potato), 4, 3),
    (ItemKind::Tool(ToolKind::WateringCan), 4, 3),
    (ItemKind::Tool(ToolKind::Scythe), 3, 3),
];

include!("types.rs");
include!("items.rs");
include!("plants.rs");
include!("screens.rs");
include!("session.rs");

/// One headless in-game day: resume (or start) the slot, work the farm plot,
/// roll over to the next morning, stroll to the village market, save. Chores
/// that no longer apply to a tile (a hoe on a growing crop) just report
/// `NoEffect`, so the same script is valid on every day of a playthrough.
pub(crate) fn run_day(slot: u32) -> Result<(), String> {
    let paths = resolve_app_paths().map_err(|error| format!("resolve app paths: {error}"))?;
    info!(root = %paths.root.display(), slot, "paths_resolved");

    let mut session = Session::open(paths, slot)?;
    let mut farm = session.enter_area(AreaId::Farm)?;
    if let Some(spawn) = find_spawn(farm.map()) {
        session.player_mut().position = SavedPosition {
            x: spawn.x,
            y: spawn.y,
        };
    }

    for (item, x, y) in DAY_CHORES {
        let outcome = session.use_item(&mut farm, item, x, y);
        info!(item = ?item, x, y, outcome = ?outcome, "chore");
    }
    session.advance_to_morning(&mut farm);
    drop(farm);

    let village = session.enter_area(AreaId::Village)?;
    let (probe_x, probe_y) = VILLAGE_PROBE;
    let probe_tile = village.tile_at(probe_x, probe_y);
    let probe_region = probe_tile
        .and_then(|tile_id| village.region_for_tile(tile_id))
        .map(|(_, region)| region);
    debug!(tile = probe_tile, region = ?probe_region, "village_probe");
    info!(
        area = village.area().key(),
        walkable_at_market = village.is_passable(probe_x, probe_y),
        earned = session.sell_crops(),
        "strolled_to_village"
    );
    drop(village);

    session.save_session()?;
    info!(
        day = session.time().day,
        currency = session.player().currency,
        "session_saved"
    );
    Ok(())
}

fn find_spawn(map: &TileMap) -> Option<&MapObject> {
    map.object_groups()
        .iter()
        .flat_map(|group| group.objects.iter())
        .find(|object| object.kind == SPAWN_OBJECT_KIND)
}
