use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BotError, Result};

const HISTORY_VERSION: &str = "1.0";

/// How many recent image picks are kept out of rotation
pub const HISTORY_CAPACITY: usize = 12;

/// Recently used image keys, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHistory {
    pub version: String,
    pub recent: Vec<String>,
}

impl Default for ImageHistory {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION.to_string(),
            recent: Vec::new(),
        }
    }
}

impl ImageHistory {
    pub fn contains(&self, key: &str) -> bool {
        self.recent.iter().any(|k| k == key)
    }

    pub fn remember(&mut self, key: &str) {
        self.recent.retain(|k| k != key);
        self.recent.push(key.to_string());
        if self.recent.len() > HISTORY_CAPACITY {
            let excess = self.recent.len() - HISTORY_CAPACITY;
            self.recent.drain(..excess);
        }
    }

    /// Loads the history, treating a missing or unreadable file as empty
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable image history");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let history: ImageHistory = serde_json::from_str(&content).map_err(|e| {
            BotError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid image history {}: {}", path.display(), e),
            ))
        })?;

        if history.version != HISTORY_VERSION {
            return Err(BotError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unsupported image history version {}", history.version),
            )));
        }

        Ok(history)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            BotError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Default location of the history file under the platform data directory
pub fn default_history_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("crypto-news-bot").join("image-history.json"))
}
