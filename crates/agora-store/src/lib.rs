//! Agora Store - Storage backends
//!
//! This crate provides the storage abstraction the coordination layer is
//! built on:
//! - `StorageBackend`: append/read/write/list/exists on logical keys
//! - `MemoryStorage`: in-memory map, used by tests and ephemeral runs
//! - `FileStorage`: file-backed implementation rooted at a directory
//!
//! Keys are logical path-like strings (`channel/log`, `document/plan`,
//! `resource/<id>.txt`). Callers own the key layout; backends own nothing
//! but bytes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use memory::MemoryStorage;
