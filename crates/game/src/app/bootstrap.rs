use tracing::info;
use tracing_subscriber::EnvFilter;

const SAVE_SLOT_ENV_VAR: &str = "FERNHOLLOW_SLOT";
const DEFAULT_SAVE_SLOT: u32 = 1;

pub(crate) struct AppWiring {
    pub(crate) slot: u32,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Fernhollow Startup ===");

    AppWiring {
        slot: parse_save_slot_from_env(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_save_slot_from_env() -> u32 {
    std::env::var(SAVE_SLOT_ENV_VAR)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(DEFAULT_SAVE_SLOT)
}
