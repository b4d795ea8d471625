//! Transient, per-session key-value storage.
//!
//! The session vault keeps two small pieces of non-secret metadata (the session seed and its
//! salt) next to the envelopes it produces. This crate provides the storage those values live
//! in, modelled on a browser tab's transient storage: string keys, string values, a lifetime
//! bounded by the session.
//!
//! # Backends
//!
//! - **[`MemoryStorage`]**: one in-process "tab". Supports a byte quota and an availability
//!   switch to reproduce quota errors and privacy-mode hosts.
//! - **[`DirStorage`]**: one session directory. Slots are files written through the atomic
//!   swap pattern (unique temp file + `fsync` + `rename`); first-writer-wins creation uses a
//!   hard link so concurrent processes converge on one value.
//!
//! Both implement [`SessionStorage`], the seam the vault is generic over.
//!
//! # Examples
//!
//! ```rust
//! use tabseal_storage::{MemoryStorage, SessionStorage, StorageError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), StorageError> {
//!     let tab = MemoryStorage::new();
//!     tab.set("intake", "opaque-envelope").await?;
//!
//!     tab.set_available(false);
//!     assert!(tab.get("intake").await.is_err());
//!     Ok(())
//! }
//! ```

mod builder;
mod dir;
mod error;
mod maintenance;
mod memory;
mod security;
mod traits;

pub use builder::DirStorageBuilder;
pub use dir::DirStorage;
pub use error::{StorageError, StorageErrorExt};
pub use memory::MemoryStorage;
pub use traits::SessionStorage;
