//! Post-quantum signing primitives for board roots.
//!
//! Every board root is signed by the board owner with ML-DSA-87 (NIST FIPS 204).
//! Identities and content references are SHA3-512 digests, so both resist
//! quantum preimage search with a wide margin.

mod keys;
mod signature;

pub use keys::{KeyPair, PrivateKey, PublicKey};
pub use signature::{sign_data, sign_message, verify_data_signature, verify_signature, Signature};

use sha3::{Digest, Sha3_512};

/// Size in bytes of every digest produced by this module.
pub const DIGEST_SIZE: usize = 64;

/// Cryptographic hash function using SHA3-512.
pub fn hash_data(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Sha3_512::new();
    hasher.update(data);
    hasher.finalize().into()
}
