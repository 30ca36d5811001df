#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum PlantId {
    Turnip,
    Potato,
}

struct PlantGrowth {
    plant: PlantId,
    /// Ground tile per growth stage, sowing first, mature last.
    stage_tiles: &'static [u32],
    crop_value: u32,
}

static PLANT_GROWTH: [PlantGrowth; 2] = [
    PlantGrowth {
        plant: PlantId::Turnip,
        stage_tiles: &TURNIP_STAGE_TILES,
        crop_value: TURNIP_CROP_VALUE,
    },
    PlantGrowth {
        plant: PlantId::Potato,
        stage_tiles: &POTATO_STAGE_TILES,
        crop_value: POTATO_CROP_VALUE,
    },
];

fn growth_for(plant: PlantId) -> &'static PlantGrowth {
    match plant {
        PlantId::Turnip => &PLANT_GROWTH[0],
        PlantId::Potato => &PLANT_GROWTH[1],
    }
}

/// Resolves a ground tile back to the plant growing there and its stage
/// index, `None` for plain ground.
fn plant_for_tile(tile_id: u32) -> Option<(PlantId, usize)> {
    PLANT_GROWTH.iter().find_map(|growth| {
        growth
            .stage_tiles
            .iter()
            .position(|stage_tile| *stage_tile == tile_id)
            .map(|stage| (growth.plant, stage))
    })
}

fn is_mature_tile(tile_id: u32) -> bool {
    plant_for_tile(tile_id).map_or(false, |(plant, stage)| {
        stage + 1 == growth_for(plant).stage_tiles.len()
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlantedPlot {
    plant: PlantId,
    planted_day: u32,
    watered: bool,
}

/// Which plots hold a growing plant and whether each was watered today.
/// Not serialized anywhere: the growth stage itself lives in the map tiles,
/// so on re-entry the overlay is rebuilt from the map and every plant starts
/// the day dry.
#[derive(Debug, Clone, Default)]
struct PlantOverlay {
    plots: HashMap<(u32, u32), PlantedPlot>,
}

impl PlantOverlay {
    fn from_map(map: &TileMap, day: u32) -> Self {
        let mut overlay = Self::default();
        if let Some(layer) = map.layer(GROUND_LAYER) {
            for y in 0..layer.height() {
                for x in 0..layer.width() {
                    let Some(tile_id) = layer.tile_at(x, y) else {
                        continue;
                    };
                    if let Some((plant, _)) = plant_for_tile(tile_id) {
                        overlay.register(x, y, plant, day, false);
                    }
                }
            }
        }
        overlay
    }

    fn register(&mut self, x: u32, y: u32, plant: PlantId, planted_day: u32, watered: bool) {
        self.plots.insert(
            (x, y),
            PlantedPlot {
                plant,
                planted_day,
                watered,
            },
        );
    }

    fn water(&mut self, x: u32, y: u32) {
        if let Some(plot) = self.plots.get_mut(&(x, y)) {
            plot.watered = true;
        }
    }

    fn remove(&mut self, x: u32, y: u32) -> Option<PlantedPlot> {
        self.plots.remove(&(x, y))
    }

    /// Drains today's watered flags and returns the plot coordinates in
    /// row-major order so morning growth applies deterministically.
    fn take_watered(&mut self) -> Vec<(u32, u32)> {
        let mut watered = Vec::new();
        for (coordinate, plot) in self.plots.iter_mut() {
            if plot.watered {
                plot.watered = false;
                watered.push(*coordinate);
            }
        }
        watered.sort_by_key(|(x, y)| (*y, *x));
        watered
    }

    #[cfg(test)]
    fn plot_at(&self, x: u32, y: u32) -> Option<&PlantedPlot> {
        self.plots.get(&(x, y))
    }
}
