//! Target fingerprint index
//!
//! Every accepted record is normalized to a 20-byte hash160 once at load
//! time, so the scan loop only performs fixed-size set lookups.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use rangescan_crypto::{
    encoding::address_to_hash160, hash160, hex, secp256k1::is_valid_public_key, Hash160,
};

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Failed to read target file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No valid {kind} records in {path} ({skipped} skipped)")]
    Empty {
        path: PathBuf,
        kind: RecordKind,
        skipped: usize,
    },
    #[error("Unknown record kind: {0} (expected ADDRESS, HASH160 or PUBKEY)")]
    UnknownKind(String),
}

/// Format of the lines in a target file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// Base58Check P2PKH address (1...)
    Address,
    /// 40 hex chars
    Hash160,
    /// SEC1 public key hex (02/03/04...)
    PubKey,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Address => write!(f, "ADDRESS"),
            RecordKind::Hash160 => write!(f, "HASH160"),
            RecordKind::PubKey => write!(f, "PUBKEY"),
        }
    }
}

impl FromStr for RecordKind {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADDRESS" | "ADDR" => Ok(RecordKind::Address),
            "HASH160" | "H160" => Ok(RecordKind::Hash160),
            "PUBKEY" | "PUB" => Ok(RecordKind::PubKey),
            _ => Err(TargetError::UnknownKind(s.to_string())),
        }
    }
}

impl RecordKind {
    /// Normalize one trimmed, non-empty record to its fingerprint.
    pub fn normalize(self, record: &str) -> Option<Hash160> {
        match self {
            RecordKind::Address => address_to_hash160(record).ok(),
            RecordKind::Hash160 => {
                if record.len() != 40 {
                    return None;
                }
                let mut out = [0u8; 20];
                hex::decode_to_slice(record, &mut out).ok()?;
                Some(out)
            }
            RecordKind::PubKey => {
                let bytes = hex::decode(record).ok()?;
                is_valid_public_key(&bytes).then(|| hash160(&bytes))
            }
        }
    }
}

/// Immutable set of target fingerprints
#[derive(Debug, Clone, Default)]
pub struct TargetIndex {
    fingerprints: HashSet<Hash160>,
}

/// Result of building an index
#[derive(Debug, Clone)]
pub struct TargetLoad {
    pub index: TargetIndex,
    /// Records that normalized successfully (duplicates included)
    pub accepted: usize,
    /// Malformed records
    pub skipped: usize,
}

impl TargetIndex {
    /// Build from raw lines. Blank lines are ignored, malformed ones counted.
    pub fn build<I, S>(records: I, kind: RecordKind) -> TargetLoad
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fingerprints = HashSet::new();
        let mut accepted = 0;
        let mut skipped = 0;

        for record in records {
            let line = record.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            match kind.normalize(line) {
                Some(fp) => {
                    fingerprints.insert(fp);
                    accepted += 1;
                }
                None => {
                    debug!(line, %kind, "skipping malformed target record");
                    skipped += 1;
                }
            }
        }

        TargetLoad {
            index: TargetIndex { fingerprints },
            accepted,
            skipped,
        }
    }

    /// Build from raw file contents. Lines that are not valid UTF-8 count as skipped.
    pub fn from_bytes(bytes: &[u8], kind: RecordKind) -> TargetLoad {
        let mut undecodable = 0;
        let lines = bytes
            .split(|b| *b == b'\n')
            .filter_map(|line| match std::str::from_utf8(line) {
                Ok(text) => Some(text),
                Err(_) => {
                    undecodable += 1;
                    None
                }
            });
        let mut load = Self::build(lines, kind);
        if undecodable > 0 {
            debug!(lines = undecodable, %kind, "skipping undecodable target records");
        }
        load.skipped += undecodable;
        load
    }

    /// Load a target file, failing when it is missing or yields nothing.
    pub fn load(path: &Path, kind: RecordKind) -> Result<TargetLoad, TargetError> {
        let bytes = fs::read(path).map_err(|source| TargetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let load = Self::from_bytes(&bytes, kind);
        if load.accepted == 0 {
            return Err(TargetError::Empty {
                path: path.to_path_buf(),
                kind,
                skipped: load.skipped,
            });
        }
        info!(
            unique = load.index.len(),
            accepted = load.accepted,
            skipped = load.skipped,
            %kind,
            "target database loaded"
        );
        Ok(load)
    }

    #[inline]
    pub fn contains(&self, fingerprint: &Hash160) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Fingerprints in sorted order, for exporting a normalized list
    pub fn sorted_fingerprints(&self) -> Vec<Hash160> {
        let mut all: Vec<Hash160> = self.fingerprints.iter().copied().collect();
        all.sort_unstable();
        all
    }
}

impl FromIterator<Hash160> for TargetIndex {
    fn from_iter<T: IntoIterator<Item = Hash160>>(iter: T) -> Self {
        Self {
            fingerprints: iter.into_iter().collect(),
        }
    }
}
