//! Signed root snapshots.
//!
//! A root is the only mutable thing in a board's graph: it is a signed,
//! sequence-numbered list of child references. Replacing a board's current
//! root is how any change to the board becomes visible.
//!
//! ```text
//! RootSnapshot {
//!     content: RootContent {
//!         identity,     // fingerprint of public_key
//!         public_key,   // ML-DSA-87 verification key of the owner
//!         seq,          // 0 for the first root, +1 per replace
//!         refs,         // children: board, thread index, vote containers, ...
//!         created_at,
//!     },
//!     signature,        // owner's signature over content
//!     root_hash,        // hash of content
//! }
//! ```

use crate::crypto::{sign_data, verify_data_signature, KeyPair, PublicKey, Signature};
use crate::error::{PqbbsError, Result};
use crate::graph::{current_timestamp_millis, Identity, Reference};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The signed part of a root snapshot.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootContent {
    /// Board identity (fingerprint of `public_key`).
    pub identity: Identity,
    /// Owner's verification key bytes.
    pub public_key: Vec<u8>,
    /// Version counter.
    pub seq: u64,
    /// Child references.
    pub refs: Vec<Reference>,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub created_at: u64,
}

impl fmt::Debug for RootContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootContent")
            .field("identity", &self.identity)
            .field("seq", &self.seq)
            .field("refs", &self.refs)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl RootContent {
    fn content_hash(&self) -> Result<Reference> {
        let encoded = bincode::serialize(self).map_err(|e| {
            PqbbsError::serialization(format!("Failed to serialize root content: {}", e))
        })?;
        Ok(Reference::of_bytes(&encoded))
    }
}

/// A published, signed version of a board's graph.
#[derive(Clone, Serialize, Deserialize)]
pub struct RootSnapshot {
    content: RootContent,
    signature: Signature,
    root_hash: Reference,
}

impl fmt::Debug for RootSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSnapshot")
            .field("identity", &self.content.identity)
            .field("seq", &self.content.seq)
            .field("refs", &self.content.refs.len())
            .field("root_hash", &self.root_hash)
            .finish()
    }
}

impl RootSnapshot {
    /// Creates and signs the first root (seq 0) of a board owned by `keypair`.
    pub fn create(keypair: &KeyPair, refs: Vec<Reference>) -> Result<Self> {
        let content = RootContent {
            identity: Identity::of_key(keypair.public_key()),
            public_key: keypair.public_key().as_bytes().to_vec(),
            seq: 0,
            refs,
            created_at: current_timestamp_millis(),
        };
        Self::sign(content, keypair)
    }

    /// Creates and signs the root that follows this one.
    ///
    /// # Errors
    /// Returns `NotMaster` if `keypair` does not own this board.
    pub fn successor(&self, keypair: &KeyPair, refs: Vec<Reference>) -> Result<Self> {
        if Identity::of_key(keypair.public_key()) != self.content.identity {
            return Err(PqbbsError::not_master(format!(
                "signing key does not own board {}",
                self.content.identity
            )));
        }
        let content = RootContent {
            identity: self.content.identity,
            public_key: self.content.public_key.clone(),
            seq: self.content.seq + 1,
            refs,
            created_at: current_timestamp_millis(),
        };
        Self::sign(content, keypair)
    }

    fn sign(content: RootContent, keypair: &KeyPair) -> Result<Self> {
        let root_hash = content.content_hash()?;
        let signature = sign_data(keypair.private_key(), &content)?;
        Ok(Self {
            content,
            signature,
            root_hash,
        })
    }

    /// Verifies identity binding, content hash and signature.
    pub fn verify(&self) -> Result<()> {
        let public_key = self.public_key()?;
        if Identity::of_key(&public_key) != self.content.identity {
            return Err(PqbbsError::validation(
                "Root public key does not match board identity",
            ));
        }
        if self.content.content_hash()? != self.root_hash {
            return Err(PqbbsError::validation("Root content hash mismatch"));
        }
        verify_data_signature(&public_key, &self.content, &self.signature)
    }

    /// Reconstructs the owner's public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_bytes(&self.content.public_key)
    }

    /// Returns the board identity.
    pub fn identity(&self) -> &Identity {
        &self.content.identity
    }

    /// Returns the version counter.
    pub fn seq(&self) -> u64 {
        self.content.seq
    }

    /// Returns the child references.
    pub fn refs(&self) -> &[Reference] {
        &self.content.refs
    }

    /// Returns the creation timestamp in milliseconds.
    pub fn created_at(&self) -> u64 {
        self.content.created_at
    }

    /// Returns the hash of the signed content.
    pub fn hash(&self) -> &Reference {
        &self.root_hash
    }

    /// Returns the signed content.
    pub fn content(&self) -> &RootContent {
        &self.content
    }
}
