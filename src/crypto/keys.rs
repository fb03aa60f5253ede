//! ML-DSA-87 key generation and key material handling.

use crate::crypto::{hash_data, DIGEST_SIZE};
use crate::error::{PqbbsError, Result};
use pqcrypto_mldsa::mldsa87::{self, PublicKey as Mldsa87PublicKey, SecretKey as Mldsa87SecretKey};
use pqcrypto_traits::sign::{PublicKey as SignPublicKey, SecretKey as SignSecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An ML-DSA-87 verification key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    key_bytes: Vec<u8>,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("fingerprint", &hex::encode(&self.fingerprint()[..8]))
            .field("key_size", &self.key_bytes.len())
            .finish()
    }
}

impl PublicKey {
    /// Reconstructs a public key from raw bytes, checking that they decode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Mldsa87PublicKey::from_bytes(bytes)
            .map_err(|_| PqbbsError::key("Invalid ML-DSA-87 public key bytes"))?;
        Ok(Self {
            key_bytes: bytes.to_vec(),
        })
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    /// SHA3-512 fingerprint of the key bytes.
    pub fn fingerprint(&self) -> [u8; DIGEST_SIZE] {
        hash_data(&self.key_bytes)
    }

    pub(crate) fn as_mldsa87(&self) -> Result<Mldsa87PublicKey> {
        Mldsa87PublicKey::from_bytes(&self.key_bytes)
            .map_err(|_| PqbbsError::key("Failed to reconstruct ML-DSA-87 public key from bytes"))
    }
}

/// An ML-DSA-87 signing key. The key bytes are wiped when dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    key_bytes: Vec<u8>,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key_size", &self.key_bytes.len())
            .finish_non_exhaustive()
    }
}

impl PrivateKey {
    pub(crate) fn as_mldsa87(&self) -> Result<Mldsa87SecretKey> {
        Mldsa87SecretKey::from_bytes(&self.key_bytes)
            .map_err(|_| PqbbsError::key("Failed to reconstruct ML-DSA-87 secret key from bytes"))
    }
}

/// A matched ML-DSA-87 verification and signing key.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generates a new ML-DSA-87 key pair.
    ///
    /// `mldsa87::keypair()` draws from the library's internal CSPRNG.
    pub fn generate_mldsa87() -> Result<Self> {
        let (public_key, secret_key) = mldsa87::keypair();

        Ok(Self {
            public: PublicKey {
                key_bytes: SignPublicKey::as_bytes(&public_key).to_vec(),
            },
            private: PrivateKey {
                key_bytes: SignSecretKey::as_bytes(&secret_key).to_vec(),
            },
        })
    }

    /// Returns the public half.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Returns the private half.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }
}
