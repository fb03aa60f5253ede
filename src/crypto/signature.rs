//! Detached ML-DSA-87 signatures.

use crate::crypto::hash_data;
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::error::{PqbbsError, Result};
use pqcrypto_mldsa::mldsa87;
use pqcrypto_traits::sign::DetachedSignature;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A detached post-quantum signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    signature_bytes: Vec<u8>,
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("signature_size", &self.signature_bytes.len())
            .finish()
    }
}

impl Signature {
    /// Returns the signature bytes.
    pub fn signature_bytes(&self) -> &[u8] {
        &self.signature_bytes
    }
}

/// Signs the SHA3-512 digest of `message`.
pub fn sign_message(private_key: &PrivateKey, message: &[u8]) -> Result<Signature> {
    let secret_key = private_key
        .as_mldsa87()
        .map_err(|e| PqbbsError::signature(format!("Failed to get ML-DSA-87 secret key: {}", e)))?;

    let message_hash = hash_data(message);
    let detached = mldsa87::detached_sign(&message_hash, &secret_key);

    Ok(Signature {
        signature_bytes: detached.as_bytes().to_vec(),
    })
}

/// Verifies a signature produced by [`sign_message`].
pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<()> {
    let public_key = public_key
        .as_mldsa87()
        .map_err(|e| PqbbsError::signature(format!("Failed to get ML-DSA-87 public key: {}", e)))?;

    let detached = mldsa87::DetachedSignature::from_bytes(&signature.signature_bytes)
        .map_err(|_| PqbbsError::signature("Failed to reconstruct ML-DSA-87 signature"))?;

    let message_hash = hash_data(message);
    mldsa87::verify_detached_signature(&detached, &message_hash, &public_key)
        .map_err(|_| PqbbsError::signature("Signature verification failed"))
}

/// Signs the bincode encoding of `data`.
pub fn sign_data<T: Serialize>(private_key: &PrivateKey, data: &T) -> Result<Signature> {
    let serialized = bincode::serialize(data)
        .map_err(|e| PqbbsError::serialization(format!("Failed to serialize data: {}", e)))?;
    sign_message(private_key, &serialized)
}

/// Verifies a signature over the bincode encoding of `data`.
pub fn verify_data_signature<T: Serialize>(
    public_key: &PublicKey,
    data: &T,
    signature: &Signature,
) -> Result<()> {
    let serialized = bincode::serialize(data)
        .map_err(|e| PqbbsError::serialization(format!("Failed to serialize data: {}", e)))?;
    verify_signature(public_key, &serialized, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_signature_verification() {
        let keypair = KeyPair::generate_mldsa87().unwrap();
        let message = b"root seq 7";
        let signature = sign_message(keypair.private_key(), message).unwrap();

        verify_signature(keypair.public_key(), message, &signature).unwrap();
    }

    #[test]
    fn test_signature_wrong_message() {
        let keypair = KeyPair::generate_mldsa87().unwrap();
        let signature = sign_message(keypair.private_key(), b"original").unwrap();

        assert!(verify_signature(keypair.public_key(), b"tampered", &signature).is_err());
    }

    #[test]
    fn test_signature_wrong_key() {
        let signer = KeyPair::generate_mldsa87().unwrap();
        let other = KeyPair::generate_mldsa87().unwrap();
        let signature = sign_message(signer.private_key(), b"message").unwrap();

        assert!(verify_signature(other.public_key(), b"message", &signature).is_err());
    }

    #[test]
    fn test_data_signature_roundtrip() {
        let keypair = KeyPair::generate_mldsa87().unwrap();
        let data = (42u64, "board".to_string());
        let signature = sign_data(keypair.private_key(), &data).unwrap();

        verify_data_signature(keypair.public_key(), &data, &signature).unwrap();
        assert!(
            verify_data_signature(keypair.public_key(), &(43u64, "board".to_string()), &signature)
                .is_err()
        );
    }
}
