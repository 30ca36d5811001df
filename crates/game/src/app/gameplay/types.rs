#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AreaId {
    Farm,
    Village,
}

impl AreaId {
    fn key(self) -> &'static str {
        match self {
            AreaId::Farm => "farm",
            AreaId::Village => "village",
        }
    }

    /// Persistent areas keep their tile edits in the save archive;
    /// the rest reload pristine from `assets/maps/` every visit.
    fn is_persistent(self) -> bool {
        matches!(self, AreaId::Farm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SavedPosition {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PlayerState {
    name: String,
    current_map: String,
    position: SavedPosition,
    inventory: Vec<ItemKind>,
    action_bar: Vec<ItemKind>,
    currency: u32,
    selected_slot: usize,
}

impl PlayerState {
    fn new_game() -> Self {
        Self {
            name: DEFAULT_PLAYER_NAME.to_string(),
            current_map: AreaId::Farm.key().to_string(),
            position: SavedPosition { x: 0.0, y: 0.0 },
            inventory: Vec::new(),
            action_bar: starting_action_bar(),
            currency: STARTING_CURRENCY,
            selected_slot: 0,
        }
    }
}

fn starting_action_bar() -> Vec<ItemKind> {
    vec![
        ItemKind::Tool(ToolKind::Hoe),
        ItemKind::Tool(ToolKind::WateringCan),
        ItemKind::Tool(ToolKind::Scythe),
        ItemKind::Seed(PlantId::Turnip),
        ItemKind::Seed(PlantId::Potato),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct TimeState {
    day: u32,
    hour: u8,
    minute: u8,
}

impl TimeState {
    fn dawn_of(day: u32) -> Self {
        Self {
            day,
            hour: DAY_START_HOUR,
            minute: 0,
        }
    }

    fn advance_to_morning(&mut self) {
        self.day = self.day.saturating_add(1);
        self.hour = DAY_START_HOUR;
        self.minute = 0;
    }
}
