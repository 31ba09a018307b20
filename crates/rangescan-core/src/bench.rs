//! Single-thread throughput measurements for the derivation pipeline

use std::hint::black_box;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use rangescan_crypto::{hash160, Secp256k1Keypair};

/// Keys per second for each pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub samples: u64,
    /// Random key generation only
    pub keygen_kps: f64,
    /// Key generation + compressed hash160
    pub compressed_kps: f64,
    /// Key generation + uncompressed hash160
    pub uncompressed_kps: f64,
    /// Key generation + both hash160s
    pub both_kps: f64,
}

pub fn run_benchmark(samples: u64) -> BenchmarkReport {
    let samples = samples.max(1);

    let keygen_kps = measure(samples, || {
        black_box(Secp256k1Keypair::generate());
    });
    let compressed_kps = measure(samples, || {
        let kp = Secp256k1Keypair::generate();
        black_box(hash160(&kp.public_key_compressed()));
    });
    let uncompressed_kps = measure(samples, || {
        let kp = Secp256k1Keypair::generate();
        black_box(hash160(&kp.public_key_uncompressed()));
    });
    let both_kps = measure(samples, || {
        let kp = Secp256k1Keypair::generate();
        black_box(kp.fingerprint_compressed());
        black_box(kp.fingerprint_uncompressed());
    });

    BenchmarkReport {
        samples,
        keygen_kps,
        compressed_kps,
        uncompressed_kps,
        both_kps,
    }
}

fn measure(samples: u64, mut f: impl FnMut()) -> f64 {
    let start = Instant::now();
    for _ in 0..samples {
        f();
    }
    let elapsed = start.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        samples as f64 / elapsed
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_reports_rates() {
        let report = run_benchmark(20);
        assert_eq!(report.samples, 20);
        assert!(report.keygen_kps > 0.0);
        assert!(report.compressed_kps > 0.0);
        assert!(report.uncompressed_kps > 0.0);
        assert!(report.both_kps > 0.0);
    }
}
