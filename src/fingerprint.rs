//! Run fingerprints.
//!
//! A fingerprint is the first four bytes of a SHA-256 digest over the test
//! parameters, read as a big-endian `u32`. Decoders treat it as opaque.

use sha2::{Digest, Sha256};

/// Derive a fingerprint from the parameters that identify a test run.
pub fn derive(
    team_id: u16,
    battery_id: &str,
    load_milliohms: u32,
    poll_interval_ms: u32,
    start_timestamp: u64,
) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(team_id.to_be_bytes());
    hasher.update(battery_id.as_bytes());
    hasher.update(load_milliohms.to_be_bytes());
    hasher.update(poll_interval_ms.to_be_bytes());
    hasher.update(start_timestamp.to_be_bytes());
    let digest = hasher.finalize();
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
