use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{error, info, warn};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error_handling::types::UploadError;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid filename pattern"));

/// Reduces an uploaded filename to something safe to store.
///
/// The name is NFKD-normalized and whatever is still not ASCII is dropped,
/// so accented letters keep their base letter. Path separators turn into
/// spaces, whitespace runs are joined with `_`, anything outside
/// `[A-Za-z0-9_.-]` is removed and leading/trailing dots and underscores
/// are stripped. The result may be empty.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_FILENAME_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Directory of uploaded attachments.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    allowed_extensions: HashSet<String>,
}

impl UploadStore {
    pub fn new<P: AsRef<Path>>(dir: P, allowed_extensions: &[String]) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            allowed_extensions: allowed_extensions.iter().cloned().collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<(), UploadError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            error!("Failed to create upload dir {}: {}", self.dir.display(), e);
            UploadError::IoError(e)
        })
    }

    /// A filename is allowed when it has a dot and the text after the last
    /// dot is one of the configured extensions (case-sensitive).
    pub fn allowed_file(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.allowed_extensions.contains(ext))
    }

    /// Validates and writes an uploaded file, returning the sanitized name it
    /// was stored under. An existing file with that name is overwritten.
    pub async fn save(&self, filename: &str, data: &[u8]) -> Result<String, UploadError> {
        if filename.is_empty() {
            return Err(UploadError::MissingFile);
        }
        if !self.allowed_file(filename) {
            warn!("Rejected upload with disallowed extension: {}", filename);
            return Err(UploadError::DisallowedExtension(filename.to_string()));
        }
        let stored = secure_filename(filename);
        if stored.is_empty() {
            warn!("Rejected upload with unusable name: {}", filename);
            return Err(UploadError::InvalidFilename(filename.to_string()));
        }
        let path = self.dir.join(&stored);
        tokio::fs::write(&path, data).await.map_err(|e| {
            error!("Failed to write upload {}: {}", path.display(), e);
            UploadError::IoError(e)
        })?;
        info!("Stored upload {} ({} bytes)", path.display(), data.len());
        Ok(stored)
    }
}
