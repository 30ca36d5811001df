type SessionResult<T> = Result<T, String>;

/// One save slot's live state: the archive it persists to, the shared
/// texture cache, and the player/time entries held in memory between saves.
#[derive(Debug)]
struct Session {
    paths: AppPaths,
    archive: SaveArchive,
    textures: TextureCache,
    player: PlayerState,
    time: TimeState,
}

impl Session {
    fn slot_archive_path(paths: &AppPaths, slot: u32) -> PathBuf {
        paths.saves_dir.join(format!("slot_{slot}.save"))
    }

    fn open(paths: AppPaths, slot: u32) -> SessionResult<Self> {
        let archive = SaveArchive::new(Self::slot_archive_path(&paths, slot));
        if archive.exists() {
            Self::resume(paths, archive)
        } else {
            Self::new_game(paths, archive)
        }
    }

    /// Seeds a fresh archive: player and time entries plus the farm map
    /// copied from the pristine asset, so later tile patches have a
    /// document to land in.
    fn new_game(paths: AppPaths, archive: SaveArchive) -> SessionResult<Self> {
        let player = PlayerState::new_game();
        let time = TimeState::dawn_of(1);

        let farm_path = paths.maps_dir().join(format!("{}.tmx", AreaId::Farm.key()));
        let farm_document = fs::read_to_string(&farm_path)
            .map_err(|error| format!("read pristine map '{}': {error}", farm_path.display()))?;

        let mut entries: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        entries.insert(
            PLAYER_ENTRY.to_string(),
            serde_json::to_vec_pretty(&player)
                .map_err(|error| format!("encode player entry: {error}"))?,
        );
        entries.insert(
            TIME_ENTRY.to_string(),
            serde_json::to_vec_pretty(&time)
                .map_err(|error| format!("encode time entry: {error}"))?,
        );
        archive
            .write_entries(&entries)
            .map_err(|error| format!("seed save archive: {error}"))?;
        MapPersistence::new(archive.clone(), AreaId::Farm.key())
            .write_document(&farm_document)
            .map_err(|error| format!("seed farm map entry: {error}"))?;

        info!(path = %archive.path().display(), "new_game_started");
        Ok(Self {
            paths,
            archive,
            textures: TextureCache::new(),
            player,
            time,
        })
    }

    fn resume(paths: AppPaths, archive: SaveArchive) -> SessionResult<Self> {
        let player: PlayerState = archive
            .read_json_entry(PLAYER_ENTRY)
            .map_err(|error| format!("read player entry: {error}"))?;
        let time: TimeState = archive
            .read_json_entry(TIME_ENTRY)
            .map_err(|error| format!("read time entry: {error}"))?;
        Self::validate_player(&player)?;
        Self::validate_time(&time)?;

        info!(name = %player.name, day = time.day, "session_resumed");
        Ok(Self {
            paths,
            archive,
            textures: TextureCache::new(),
            player,
            time,
        })
    }

    fn validation_err(path: &str, message: impl Into<String>) -> String {
        format!("validation failed at {path}: {}", message.into())
    }

    fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> String {
        Self::validation_err(path, format!("expected {expected}, got {actual}"))
    }

    fn validate_player(player: &PlayerState) -> SessionResult<()> {
        if player.name.trim().is_empty() {
            return Err(Self::validation_err("name", "must not be blank"));
        }
        if !player.position.x.is_finite() {
            return Err(Self::expected_actual(
                "position.x",
                "finite number",
                player.position.x,
            ));
        }
        if !player.position.y.is_finite() {
            return Err(Self::expected_actual(
                "position.y",
                "finite number",
                player.position.y,
            ));
        }
        if player.action_bar.is_empty() {
            return Err(Self::validation_err("action_bar", "must not be empty"));
        }
        if player.selected_slot >= player.action_bar.len() {
            return Err(Self::expected_actual(
                "selected_slot",
                format!("index below {}", player.action_bar.len()),
                player.selected_slot,
            ));
        }
        Ok(())
    }

    fn validate_time(time: &TimeState) -> SessionResult<()> {
        if time.day == 0 {
            return Err(Self::validation_err("day", "must start at 1"));
        }
        if time.hour >= 24 {
            return Err(Self::expected_actual("hour", "0..24", time.hour));
        }
        if time.minute >= 60 {
            return Err(Self::expected_actual("minute", "0..60", time.minute));
        }
        Ok(())
    }

    fn player(&self) -> &PlayerState {
        &self.player
    }

    fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.player
    }

    fn time(&self) -> &TimeState {
        &self.time
    }

    fn enter_area(&mut self, area: AreaId) -> SessionResult<AreaScreen> {
        let screen = AreaScreen::enter(
            &self.paths,
            &self.archive,
            &mut self.textures,
            area,
            self.time.day,
        )?;
        self.player.current_map = area.key().to_string();
        info!(
            area = area.key(),
            persistent = area.is_persistent(),
            "area_entered"
        );
        Ok(screen)
    }

    fn use_item(
        &mut self,
        screen: &mut AreaScreen,
        item: ItemKind,
        x: u32,
        y: u32,
    ) -> ItemUseOutcome {
        let outcome = screen.use_item(&item, x, y, self.time.day);
        if let ItemUseOutcome::Harvested { crop } = outcome {
            self.player.inventory.push(ItemKind::Crop(crop));
            info!(crop = ?crop, "crop_harvested");
        }
        outcome
    }

    /// Turns every crop in the inventory into currency at its table value.
    fn sell_crops(&mut self) -> u32 {
        let mut earned = 0;
        self.player.inventory.retain(|item| match item {
            ItemKind::Crop(plant) => {
                earned += growth_for(*plant).crop_value;
                false
            }
            _ => true,
        });
        if earned > 0 {
            self.player.currency = self.player.currency.saturating_add(earned);
            info!(earned, currency = self.player.currency, "crops_sold");
        }
        earned
    }

    fn advance_to_morning(&mut self, screen: &mut AreaScreen) {
        self.time.advance_to_morning();
        let advanced = screen.morning_tick();
        info!(
            day = self.time.day,
            plants_advanced = advanced,
            "morning_tick"
        );
    }

    /// Map entries are patched as edits happen; this writes the player and
    /// time entries, which only change in memory.
    fn save_session(&self) -> SessionResult<()> {
        self.archive
            .write_json_entry(PLAYER_ENTRY, &self.player)
            .map_err(|error| format!("write player entry: {error}"))?;
        self.archive
            .write_json_entry(TIME_ENTRY, &self.time)
            .map_err(|error| format!("write time entry: {error}"))?;
        Ok(())
    }
}
