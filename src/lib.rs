//! vaultburn - secure file deletion and single-file encryption
//!
//! Files are shredded by overwriting them with random data and unlinking
//! them, or sealed with NaCl secretbox (XSalsa20Poly1305) under a fresh
//! random key per file.

#![forbid(unsafe_code)]

pub mod batch;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod error;
pub mod file_ops;
pub mod format;
pub mod key;
pub mod key_source;
pub mod oplog;
pub mod secretcrypt;
pub mod shred;
pub mod targets;
pub mod varmor;
