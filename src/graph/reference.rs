//! Content references and public identities.
//!
//! Both are 64-byte SHA3-512 digests. A [`Reference`] addresses an immutable
//! stored object; an [`Identity`] is the fingerprint of an ML-DSA-87 public key
//! and names a board or a voter.

use crate::crypto::{hash_data, PublicKey, DIGEST_SIZE};
use crate::error::{PqbbsError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Serde helpers for fixed 64-byte digests.
mod digest_bytes {
    use super::DIGEST_SIZE;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        bytes: &[u8; DIGEST_SIZE],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<[u8; DIGEST_SIZE], D::Error> {
        struct DigestVisitor;

        impl<'de> serde::de::Visitor<'de> for DigestVisitor {
            type Value = [u8; DIGEST_SIZE];

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a byte array of length {}", DIGEST_SIZE)
            }

            fn visit_bytes<E: serde::de::Error>(
                self,
                v: &[u8],
            ) -> std::result::Result<Self::Value, E> {
                v.try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut arr = [0u8; DIGEST_SIZE];
                for (i, byte) in arr.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(arr)
            }
        }

        deserializer.deserialize_bytes(DigestVisitor)
    }
}

fn parse_hex_digest(s: &str, what: &str) -> Result<[u8; DIGEST_SIZE]> {
    let bytes =
        hex::decode(s).map_err(|_| PqbbsError::validation(format!("Invalid hex for {}", what)))?;
    bytes.try_into().map_err(|_| {
        PqbbsError::validation(format!(
            "{} must be exactly {} bytes ({} hex characters)",
            what,
            DIGEST_SIZE,
            DIGEST_SIZE * 2
        ))
    })
}

/// Content hash of a stored graph object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference([u8; DIGEST_SIZE]);

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        digest_bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        digest_bytes::deserialize(deserializer).map(Self)
    }
}

impl Reference {
    /// Addresses an already-encoded object.
    pub fn of_bytes(encoded: &[u8]) -> Self {
        Self(hash_data(encoded))
    }

    /// Creates a reference from raw digest bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Returns the hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a reference from its hex encoding.
    pub fn from_hex(s: &str) -> Result<Self> {
        parse_hex_digest(s, "Reference").map(Self)
    }

    /// First 8 bytes in hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({}...)", self.short())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Fingerprint of a signing key; the stable name of a board or voter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; DIGEST_SIZE]);

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        digest_bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        digest_bytes::deserialize(deserializer).map(Self)
    }
}

impl Identity {
    /// Derives the identity of a public key.
    pub fn of_key(public_key: &PublicKey) -> Self {
        Self(public_key.fingerprint())
    }

    /// Creates an identity from raw fingerprint bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw fingerprint bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Returns the hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses an identity from its hex encoding.
    pub fn from_hex(s: &str) -> Result<Self> {
        parse_hex_digest(s, "Identity").map(Self)
    }

    /// First 8 bytes in hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({}...)", self.short())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}
