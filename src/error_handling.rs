//! Error types shared by the configuration, storage and web layers.

pub mod types;

pub use types::{ConfigError, StorageError, UploadError, WebError};
