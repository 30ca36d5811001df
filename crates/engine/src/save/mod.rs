mod archive;
mod atomic_io;
mod patch;

pub use archive::{map_entry_name, ArchiveError, SaveArchive, PLAYER_ENTRY, TIME_ENTRY};
pub use patch::{MapPersistence, PatchError};
