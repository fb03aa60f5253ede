//! Traits that let a domain object set live in the graph.
//!
//! The graph layer never names concrete object types. A domain supplies one
//! enum implementing [`GraphObject`] (the unit of storage and hashing) and a
//! [`Typed`] impl for each variant payload, which plays the role of the type
//! tag when a cursor searches for a container.

use crate::error::{PqbbsError, Result};
use crate::graph::Reference;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A storable, content-addressed object that may reference other objects.
pub trait GraphObject: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human-readable name of the concrete variant.
    fn type_name(&self) -> &'static str;

    /// References to child objects, in a stable order.
    fn child_refs(&self) -> Vec<Reference>;

    /// Replaces the child reference at `index` (an index into [`child_refs`]).
    ///
    /// [`child_refs`]: GraphObject::child_refs
    fn replace_child_ref(&mut self, index: usize, reference: Reference) -> Result<()>;

    /// Encodes the object. The reference of an object is the hash of these bytes.
    fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            PqbbsError::serialization(format!("Failed to encode {}: {}", self.type_name(), e))
        })
    }

    /// Decodes an object previously produced by [`encode`](GraphObject::encode).
    fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| PqbbsError::serialization(format!("Failed to decode object: {}", e)))
    }
}

/// A concrete payload type of the graph object enum `O`.
pub trait Typed<O: GraphObject>: Clone + Sized {
    /// Name used in error context.
    const TYPE_NAME: &'static str;

    /// Wraps the payload into the storable enum.
    fn into_object(self) -> O;

    /// Unwraps the payload, or `None` if `object` is a different variant.
    fn from_object(object: O) -> Option<Self>;
}

/// Child-slot helper for containers that hold several reference lists.
///
/// Treats the concatenation of `lists` as one flat list and returns the slot at
/// `index` of that flat list.
pub fn flat_slot_mut<'a, I>(lists: I, index: usize) -> Option<&'a mut Reference>
where
    I: IntoIterator<Item = &'a mut Vec<Reference>>,
{
    let mut remaining = index;
    for list in lists {
        if remaining < list.len() {
            return list.get_mut(remaining);
        }
        remaining -= list.len();
    }
    None
}
