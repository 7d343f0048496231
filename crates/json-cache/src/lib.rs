use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use market_core::MarketError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Cache namespaces, one subtree per artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Daily,
    Intraday,
    Sentiment,
}

impl CacheKind {
    fn dir(&self) -> &'static str {
        match self {
            CacheKind::Daily => "stocks",
            CacheKind::Intraday => "intraday",
            CacheKind::Sentiment => "news",
        }
    }

    fn file_name(&self, key: &str) -> String {
        match self {
            CacheKind::Daily => format!("{key}-daily.json"),
            CacheKind::Intraday | CacheKind::Sentiment => format!("{key}.json"),
        }
    }
}

/// Flat-file JSON store rooted at a single data directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    base: PathBuf,
}

impl JsonStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Deterministic location for an artifact. The key is trimmed and
    /// lower-cased so lookups are case-insensitive.
    pub fn path(&self, kind: CacheKind, key: &str) -> PathBuf {
        let key = key.trim().to_lowercase();
        self.base.join(kind.dir()).join(kind.file_name(&key))
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Reads and deserializes a cached artifact. A missing file and a
    /// shape mismatch are the same failure from the caller's side.
    pub fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T, MarketError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| MarketError::Deserialization(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| MarketError::Deserialization(format!("{}: {e}", path.display())))
    }

    /// Serializes pretty JSON to a temp file in the destination directory
    /// and renames it into place, so readers never see a partial file.
    pub fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), MarketError> {
        let parent = path.parent().ok_or_else(|| {
            MarketError::Cache(format!("no parent directory for {}", path.display()))
        })?;
        fs::create_dir_all(parent).map_err(|e| MarketError::Cache(e.to_string()))?;

        let json =
            serde_json::to_string_pretty(value).map_err(|e| MarketError::Cache(e.to_string()))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| MarketError::Cache(e.to_string()))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| MarketError::Cache(e.to_string()))?;
        tmp.persist(path).map_err(|e| MarketError::Cache(e.to_string()))?;

        tracing::debug!(path = %path.display(), "cache write");
        Ok(())
    }
}

/// True when the file exists and its modification time is younger than
/// `ttl`. Any I/O problem reads as stale, so a cold or unreadable cache
/// triggers a refresh instead of an error.
pub fn is_fresh(path: &Path, ttl: Duration) -> bool {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age < ttl,
        // mtime in the future reads as fresh.
        Err(_) => true,
    }
}
