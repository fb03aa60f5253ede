//! Lock helpers that recover from poisoning.
//!
//! A panic while holding one of these locks leaves the protected map in a
//! consistent state (every write is a single insert or remove), so the data is
//! taken back instead of propagating the poison to every later caller.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::error;

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        error!("RwLock was poisoned on read, recovering");
        poisoned.into_inner()
    })
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        error!("RwLock was poisoned on write, recovering");
        poisoned.into_inner()
    })
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        error!("Mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}
