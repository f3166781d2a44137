//! Proof-of-work
//!
//! A proof is valid when the SHA-256 hex digest of the decimal
//! concatenation `"{last_proof}{proof}"` starts with `difficulty` zeros.

use crate::hash::sha256_hex;

/// Default number of leading zero hex digits
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// Upper bound accepted by configuration
pub const MAX_DIFFICULTY: u32 = 8;

/// Check a candidate proof against the previous block's proof
#[must_use]
pub fn valid_proof(last_proof: u64, proof: u64, difficulty: u32) -> bool {
    let digest = sha256_hex(format!("{last_proof}{proof}").as_bytes());
    digest
        .bytes()
        .take(difficulty as usize)
        .filter(|b| *b == b'0')
        .count()
        == difficulty as usize
}

/// Find the smallest valid proof
///
/// CPU bound; callers on an async runtime should run it on a blocking pool.
#[must_use]
pub fn proof_of_work(last_proof: u64, difficulty: u32) -> u64 {
    let mut proof = 0u64;
    while !valid_proof(last_proof, proof, difficulty) {
        proof += 1;
    }
    tracing::debug!(last_proof, proof, difficulty, "proof of work found");
    proof
}
