//! Hierarchical key-value access on top of flat object storage.
//!
//! Object stores only know flat keys. This crate emulates groups (directories),
//! datasets (files), directory markers and ranged writes on top of them, and
//! offers an optimistic-concurrency read policy based on object generations.
pub mod cli;
pub mod config;
pub mod error;
pub mod storage;
