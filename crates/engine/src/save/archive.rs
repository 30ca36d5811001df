use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::atomic_io::write_bytes_atomic;

pub const PLAYER_ENTRY: &str = "player.json";
pub const TIME_ENTRY: &str = "time.json";

/// Entry name for one persistent map's serialized document.
pub fn map_entry_name(map_key: &str) -> String {
    format!("maps/{map_key}.tmx")
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read/write save archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("save archive {path} has invalid format: {message}")]
    InvalidFormat { path: PathBuf, message: String },
    #[error("save archive {path} has no entry {name:?}")]
    EntryMissing { path: PathBuf, name: String },
    #[error("entry {name:?} in save archive {path} is invalid: {message}")]
    EntryFormat {
        path: PathBuf,
        name: String,
        message: String,
    },
}

/// Handle to one save container on disk: a deflate-compressed archive of
/// named entries (player state, clock state, one document per persistent
/// map). Every change rewrites the file as a whole, and a read-modify-write
/// sequence assumes exclusive use; nothing here locks.
#[derive(Debug, Clone)]
pub struct SaveArchive {
    path: PathBuf,
}

impl SaveArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn entry_names(&self) -> Result<Vec<String>, ArchiveError> {
        let mut archive = self.open()?;
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|error| self.invalid_format(error))?;
            names.push(entry.name().to_string());
        }
        Ok(names)
    }

    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut archive = self.open()?;
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(ArchiveError::EntryMissing {
                    path: self.path.clone(),
                    name: name.to_string(),
                })
            }
            Err(error) => return Err(self.invalid_format(error)),
        };
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|error| ArchiveError::EntryFormat {
                path: self.path.clone(),
                name: name.to_string(),
                message: error.to_string(),
            })?;
        Ok(bytes)
    }

    pub fn read_all(&self) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
        let mut archive = self.open()?;
        let mut entries = BTreeMap::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|error| self.invalid_format(error))?;
            let name = entry.name().to_string();
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|error| ArchiveError::EntryFormat {
                    path: self.path.clone(),
                    name: name.clone(),
                    message: error.to_string(),
                })?;
            entries.insert(name, bytes);
        }
        Ok(entries)
    }

    /// Writes the given entries as a fresh container, atomically replacing
    /// whatever was on disk.
    pub fn write_entries(&self, entries: &BTreeMap<String, Vec<u8>>) -> Result<(), ArchiveError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in entries {
            writer
                .start_file(name.as_str(), options)
                .map_err(|error| self.invalid_format(error))?;
            writer.write_all(bytes).map_err(|source| ArchiveError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        let cursor = writer.finish().map_err(|error| self.invalid_format(error))?;
        write_bytes_atomic(&self.path, &cursor.into_inner()).map_err(|source| {
            ArchiveError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Entry update is delete-then-recreate: the container is read in full,
    /// the named entry swapped, and the whole file rewritten.
    pub fn replace_entry(&self, name: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        let mut entries = self.read_all()?;
        entries.insert(name.to_string(), bytes.to_vec());
        self.write_entries(&entries)
    }

    pub fn read_json_entry<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArchiveError> {
        let bytes = self.read_entry(name)?;
        serde_json::from_slice(&bytes).map_err(|error| ArchiveError::EntryFormat {
            path: self.path.clone(),
            name: name.to_string(),
            message: error.to_string(),
        })
    }

    pub fn write_json_entry<T: Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<(), ArchiveError> {
        let text =
            serde_json::to_string_pretty(value).map_err(|error| ArchiveError::EntryFormat {
                path: self.path.clone(),
                name: name.to_string(),
                message: error.to_string(),
            })?;
        self.replace_entry(name, text.as_bytes())
    }

    fn open(&self) -> Result<ZipArchive<Cursor<Vec<u8>>>, ArchiveError> {
        let bytes = fs::read(&self.path).map_err(|source| ArchiveError::Io {
            path: self.path.clone(),
            source,
        })?;
        ZipArchive::new(Cursor::new(bytes)).map_err(|error| self.invalid_format(error))
    }

    fn invalid_format(&self, error: ZipError) -> ArchiveError {
        ArchiveError::InvalidFormat {
            path: self.path.clone(),
            message: error.to_string(),
        }
    }
}
