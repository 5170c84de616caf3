//! Storage subsystem
//!
//! This module provides the persistence of entries, attachment metadata and
//! uploaded files.
//!
//! Components:
//! - `storage_trait`: the Storage trait defining a uniform API.
//! - `types`: shared data types used by storage backends.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `file_storage`: the upload directory and filename sanitizing.
//! - `db_entities`: SeaORM entity models for the database backend.

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod storage_trait;
pub mod types;

pub use database_storage::{DatabaseFile, DatabaseStorage};
pub use file_storage::{secure_filename, UploadStore};
pub use storage_trait::Storage;
pub use types::{generate_resid, Attachment, Entry};
