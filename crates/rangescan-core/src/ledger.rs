//! Discovery ledger: at-most-once recording of found keys

use std::collections::HashSet;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use crossbeam_channel::Sender;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rangescan_crypto::{
    encoding::{p2pkh_address, wif_encode},
    hex, Hash160,
};

use crate::scalar::{to_be_bytes, to_hex64};

/// Which public-key encoding produced the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingKind {
    Compressed,
    Uncompressed,
}

impl fmt::Display for EncodingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingKind::Compressed => write!(f, "Compressed"),
            EncodingKind::Uncompressed => write!(f, "Uncompressed"),
        }
    }
}

/// A recorded key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    pub private_key_hex: String,
    pub private_key_decimal: String,
    pub fingerprint_hex: String,
    pub address: String,
    pub encoding: EncodingKind,
    pub wif_compressed: String,
    pub wif_uncompressed: String,
    pub discovered_at: DateTime<Local>,
}

impl Discovery {
    pub fn new(private_key: &U256, fingerprint: &Hash160, encoding: EncodingKind) -> Self {
        let key_bytes = to_be_bytes(private_key);
        Self {
            private_key_hex: to_hex64(private_key),
            private_key_decimal: private_key.to_string(),
            fingerprint_hex: hex::encode(fingerprint),
            address: p2pkh_address(fingerprint),
            encoding,
            wif_compressed: wif_encode(&key_bytes, true, true),
            wif_uncompressed: wif_encode(&key_bytes, false, true),
            discovered_at: Local::now(),
        }
    }

    /// Text block appended to the results file
    pub fn results_block(&self) -> String {
        format!(
            "[{}] FOUND: {} ({})\nHASH160: {}\nHEX: {}\nINT: {}\nWIF C: {}\nWIF U: {}\n{}\n",
            self.discovered_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.address,
            self.encoding,
            self.fingerprint_hex,
            self.private_key_hex,
            self.private_key_decimal,
            self.wif_compressed,
            self.wif_uncompressed,
            "-".repeat(50)
        )
    }
}

/// Result of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Recorded,
    AlreadyRecorded,
}

/// Shared, lock-protected log of found keys
#[derive(Debug)]
pub struct DiscoveryLedger {
    recorded: Mutex<HashSet<String>>,
    results_path: Option<PathBuf>,
    notify: Option<Sender<Discovery>>,
}

impl DiscoveryLedger {
    pub fn new(results_path: Option<PathBuf>, notify: Option<Sender<Discovery>>) -> Self {
        Self {
            recorded: Mutex::new(HashSet::new()),
            results_path,
            notify,
        }
    }

    /// Record a key unless it was already recorded.
    ///
    /// The membership check, insert and disclosure run in one critical section.
    pub fn report(
        &self,
        private_key: &U256,
        fingerprint: &Hash160,
        encoding: EncodingKind,
    ) -> ReportOutcome {
        let key_hex = to_hex64(private_key);
        // A poisoned lock still holds a consistent set; keep recording.
        let mut recorded = self.recorded.lock().unwrap_or_else(|e| e.into_inner());
        if recorded.contains(&key_hex) {
            return ReportOutcome::AlreadyRecorded;
        }
        recorded.insert(key_hex);

        let discovery = Discovery::new(private_key, fingerprint, encoding);
        info!(
            address = %discovery.address,
            encoding = %discovery.encoding,
            key = %discovery.private_key_hex,
            "key found"
        );
        self.append(&discovery);
        if let Some(tx) = &self.notify {
            let _ = tx.send(discovery);
        }
        ReportOutcome::Recorded
    }

    pub fn len(&self) -> usize {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, discovery: &Discovery) {
        let Some(path) = &self.results_path else {
            return;
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| {
                f.write_all(discovery.results_block().as_bytes())?;
                f.sync_data()
            });
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to append discovery to results file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn h160_one() -> Hash160 {
        let mut h = [0u8; 20];
        hex::decode_to_slice("751e76e8199196d454941c45d1b3a323f1433bd6", &mut h).unwrap();
        h
    }

    #[test]
    fn test_discovery_fields() {
        let d = Discovery::new(&U256::one(), &h160_one(), EncodingKind::Compressed);
        assert_eq!(d.address, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_eq!(d.wif_compressed, "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn");
        assert_eq!(d.wif_uncompressed, "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf");
        assert_eq!(d.private_key_decimal, "1");

        let block = d.results_block();
        assert!(block.contains("FOUND: 1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH (Compressed)"));
        assert!(block.contains(&format!("HEX: {}", d.private_key_hex)));
        assert!(block.ends_with(&format!("{}\n", "-".repeat(50))));
    }

    #[test]
    fn test_count_survives_poisoned_lock() {
        let ledger = Arc::new(DiscoveryLedger::new(None, None));
        ledger.report(&U256::one(), &h160_one(), EncodingKind::Compressed);

        let holder = ledger.clone();
        let _ = thread::spawn(move || {
            let _guard = holder.recorded.lock().unwrap();
            panic!("worker died holding the ledger lock");
        })
        .join();

        assert!(ledger.recorded.is_poisoned());
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_empty());
        assert_eq!(
            ledger.report(&U256::one(), &h160_one(), EncodingKind::Uncompressed),
            ReportOutcome::AlreadyRecorded
        );
    }

    #[test]
    fn test_concurrent_reports_record_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("found.txt");
        let (tx, rx) = crossbeam_channel::unbounded();
        let ledger = Arc::new(DiscoveryLedger::new(Some(path.clone()), Some(tx)));

        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let encoding = if i % 2 == 0 {
                        EncodingKind::Compressed
                    } else {
                        EncodingKind::Uncompressed
                    };
                    barrier.wait();
                    ledger.report(&U256::one(), &h160_one(), encoding)
                })
            })
            .collect();

        let outcomes: Vec<ReportOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let recorded = outcomes.iter().filter(|o| **o == ReportOutcome::Recorded).count();
        assert_eq!(recorded, 1);
        assert_eq!(outcomes.len() - recorded, workers - 1);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("HEX: ").count(), 1);
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_distinct_keys_recorded_separately() {
        let ledger = DiscoveryLedger::new(None, None);
        assert!(ledger.is_empty());
        assert_eq!(
            ledger.report(&U256::one(), &h160_one(), EncodingKind::Compressed),
            ReportOutcome::Recorded
        );
        assert_eq!(
            ledger.report(&U256::from(2u64), &[0u8; 20], EncodingKind::Compressed),
            ReportOutcome::Recorded
        );
        assert_eq!(
            ledger.report(&U256::one(), &[1u8; 20], EncodingKind::Uncompressed),
            ReportOutcome::AlreadyRecorded
        );
        assert_eq!(ledger.len(), 2);
    }
}
