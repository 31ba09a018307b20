//! Sequential scan checkpoints
//!
//! Writes are best-effort: a failed save is logged and otherwise ignored.
//! Saves go through a sibling temp file and a rename, so a crash mid-save
//! leaves the previous checkpoint intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scalar::{is_valid_scalar, parse_scalar};

/// On-disk checkpoint record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Resume value, decimal. Older files store a plain JSON number of any size.
    #[serde(with = "decimal")]
    pub last: U256,
    /// Informational only; unreadable or missing timestamps load as `None`.
    #[serde(default, deserialize_with = "lenient_time::deserialize")]
    pub time: Option<DateTime<Local>>,
}

/// Checkpoint file at a fixed path
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the checkpoint. Never fails.
    pub fn save(&self, value: U256) {
        let checkpoint = Checkpoint {
            last: value,
            time: Some(Local::now()),
        };
        let result = serde_json::to_vec(&checkpoint)
            .map_err(std::io::Error::from)
            .and_then(|bytes| self.replace(&bytes));
        match result {
            Ok(()) => debug!(path = %self.path.display(), %value, "checkpoint saved"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "checkpoint save failed"),
        }
    }

    /// Stored resume value, or 1 when the file is missing, corrupt or out of range.
    pub fn load(&self) -> U256 {
        fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Checkpoint>(&bytes).ok())
            .map(|c| c.last)
            .filter(is_valid_scalar)
            .unwrap_or_else(U256::one)
    }

    fn replace(&self, bytes: &[u8]) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

mod decimal {
    use super::*;
    use serde::{de, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        // Numbers keep their exact digits, so values past u64 survive.
        let text = match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => return Err(de::Error::custom(format!("unexpected checkpoint value {other}"))),
        };
        parse_scalar(&text).map_err(de::Error::custom)
    }
}

mod lenient_time {
    use super::*;
    use chrono::NaiveDateTime;
    use serde::Deserializer;
    use serde_json::Value;

    /// RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS[.f]` read as local time.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Local>>, D::Error> {
        let Some(Value::String(text)) = Option::<Value>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Ok(time) = DateTime::parse_from_rfc3339(&text) {
            return Ok(Some(time.with_timezone(&Local)));
        }
        Ok(NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|naive| naive.and_local_timezone(Local).earliest()))
    }
}
