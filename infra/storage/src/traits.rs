use crate::error::StorageError;
use std::fmt::Debug;
use std::future::Future;

/// Transient key-value storage scoped to one session (one browser tab, one session directory).
///
/// Values are plain strings, mirroring the host storage the session vault was designed for.
/// Implementations are cheap handles: cloning shares the same underlying session.
///
/// All methods may fail with a [`StorageError`]; callers in this workspace treat any failure
/// as "storage unavailable" and degrade instead of propagating it.
pub trait SessionStorage: Clone + Debug + Send + Sync + 'static {
    /// Reads a slot. A missing slot is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Writes a slot, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Writes a slot only if it is absent.
    ///
    /// Returns the value held by the slot after the call: `value` if this caller won, or the
    /// value persisted by an earlier writer otherwise. First writer wins.
    fn put_if_absent(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Removes a slot only while it still holds `expected`.
    ///
    /// Returns `true` if this call removed the slot. A slot that is missing or was rewritten
    /// by another caller is left alone and yields `false`.
    fn remove_if(
        &self,
        key: &str,
        expected: &str,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Removes a slot. Removing a missing slot succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Drops every slot of the session.
    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
