#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum ToolKind {
    Hoe,
    WateringCan,
    Scythe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum ItemKind {
    Tool(ToolKind),
    Seed(PlantId),
    Crop(PlantId),
}

/// The whole ground-editing rule set. Pure: which tile an item turns the
/// current tile into, `None` when the item does nothing to that ground.
/// Side effects (plant registration, watering, harvest payouts) happen a
/// level up in [`AreaScreen::use_item`].
fn tile_after_item_use(item: &ItemKind, current_tile: u32) -> Option<u32> {
    match item {
        ItemKind::Tool(ToolKind::Hoe) => match current_tile {
            TILE_GRASS => Some(TILE_SOIL),
            TILE_SOIL => Some(TILE_TILLED),
            _ => None,
        },
        ItemKind::Tool(ToolKind::WateringCan) => {
            (current_tile == TILE_TILLED).then_some(TILE_TILLED_WET)
        }
        ItemKind::Tool(ToolKind::Scythe) => is_mature_tile(current_tile).then_some(TILE_TILLED),
        ItemKind::Seed(plant) => {
            if matches!(current_tile, TILE_TILLED | TILE_TILLED_WET) {
                growth_for(*plant).stage_tiles.first().copied()
            } else {
                None
            }
        }
        ItemKind::Crop(_) => None,
    }
}
