//! Resource loading
//!
//! Engines address their data files by name. A missing resource is an error
//! the caller must handle; there is no silent fallback.

use crate::error::{EngineError, Result};
use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;

pub trait ResourceLoader {
    /// Read the whole resource named `name`
    fn load(&self, name: &str) -> Result<Vec<u8>>;
}

/// Loads resources from files below a root directory
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find `name` below the root, falling back to a case-insensitive match
    /// on the final component (legacy data discs are not case-consistent)
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let direct = self.root.join(name);
        if direct.is_file() {
            return Some(direct);
        }
        let candidate = direct;
        let parent = candidate.parent()?;
        let wanted = candidate.file_name()?.to_string_lossy().to_lowercase();
        std::fs::read_dir(parent)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .map(|f| f.to_string_lossy().to_lowercase() == wanted)
                        .unwrap_or(false)
            })
    }
}

impl ResourceLoader for DirectoryLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self
            .resolve(name)
            .ok_or_else(|| EngineError::ResourceNotFound(name.to_string()))?;
        debug!("Loading resource {} from {}", name, path.display());
        Ok(std::fs::read(path)?)
    }
}

/// In-memory resources, keyed case-insensitively
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        self.files.insert(name.to_lowercase(), data);
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| EngineError::ResourceNotFound(name.to_string()))
    }
}
