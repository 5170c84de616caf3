use std::sync::Arc;

use serde::Deserialize;

use crate::configuration::{Config, Credentials};
use crate::storage::{DatabaseFile, UploadStore};
use crate::web_interface::session::SessionSigner;

/// Everything a handler needs besides the request itself. Built once at
/// startup and shared read-only.
pub struct AppState {
    pub config: Arc<Config>,
    pub database: DatabaseFile,
    pub uploads: UploadStore,
    pub signer: Arc<SessionSigner>,
    pub credentials: Credentials,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            database: DatabaseFile::new(&config.database),
            uploads: UploadStore::new(&config.upload_folder, &config.allowed_extensions),
            signer: Arc::new(SessionSigner::new(&config.secret_key)),
            credentials: config.credentials(),
            config,
        }
    }
}

/// POST /add
#[derive(Debug, Deserialize)]
pub struct NewEntryForm {
    pub title: String,
    pub text: String,
}

/// POST /login
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Fields collected from the POST /upload multipart body.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file_name: Option<String>,
    pub data: Vec<u8>,
    pub resid: Option<String>,
    pub title: Option<String>,
}
