//! Storage Trait
//!
//! This module defines the `Storage` trait, the interface the web layer uses
//! to read and write entries and attachments.
//!
//! All methods return a `Result` to handle potential storage errors.

use async_trait::async_trait;

use crate::error_handling::types::StorageError;
use crate::storage::types::{Attachment, Entry};

/// The `Storage` trait defines the interface for entry and attachment
/// persistence.
///
/// Listings are ordered most recent first.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns every entry, newest first.
    async fn list_entries(&self) -> Result<Vec<Entry>, StorageError>;

    /// Stores a new entry under a freshly generated identifier and returns it.
    async fn create_entry(&self, title: &str, text: &str) -> Result<Entry, StorageError>;

    /// Looks an entry up by identifier.
    async fn get_entry(&self, resid: &str) -> Result<Option<Entry>, StorageError>;

    /// Returns every attachment recorded under `resid`, newest first.
    async fn list_attachments(&self, resid: &str) -> Result<Vec<Attachment>, StorageError>;

    /// Records attachment metadata. The referenced entry is not checked.
    async fn add_attachment(&self, attachment: &Attachment) -> Result<(), StorageError>;
}
