use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use thiserror::Error;

/// Decoded RGBA8 pixels for one tileset image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {message}")]
    Decode { path: PathBuf, message: String },
}

/// Decodes each image path at most once and hands out shared handles.
#[derive(Debug, Default)]
pub struct TextureCache {
    loaded: HashMap<PathBuf, Arc<Texture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> Result<Arc<Texture>, TextureError> {
        if let Some(texture) = self.loaded.get(path) {
            return Ok(Arc::clone(texture));
        }
        let texture = Arc::new(load_rgba(path)?);
        self.loaded.insert(path.to_path_buf(), Arc::clone(&texture));
        Ok(texture)
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

fn load_rgba(path: &Path) -> Result<Texture, TextureError> {
    let reader = ImageReader::open(path).map_err(|source| TextureError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|error| TextureError::Decode {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    let image = decoded.to_rgba8();
    Ok(Texture {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn load_decodes_once_and_shares_the_handle() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("tiles.png");
        image::RgbaImage::new(4, 2).save(&path).expect("write png");

        let mut cache = TextureCache::new();
        let first = cache.load(&path).expect("first load");
        let second = cache.load(&path).expect("second load");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.width, 4);
        assert_eq!(first.height, 2);
        assert_eq!(first.rgba.len(), 4 * 2 * 4);
    }

    #[test]
    fn missing_file_reports_open_error() {
        let dir = TempDir::new().expect("temp dir");
        let mut cache = TextureCache::new();
        let err = cache.load(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, TextureError::Open { .. }));
        assert!(cache.is_empty());
    }
}
