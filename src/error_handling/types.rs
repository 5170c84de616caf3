use std::fmt;

use warp::http::StatusCode;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadAddressFormatting(String),
    EmptyValue(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadAddressFormatting(e) => write!(f, "Address formatting error: {}", e),
            ConfigError::EmptyValue(e) => write!(f, "Missing value: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed,
    SchemaFailed,
    WriteFailed,
    ReadFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::SchemaFailed => write!(f, "Storage schema initialization failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum UploadError {
    MissingFile,
    DisallowedExtension(String),
    InvalidFilename(String),
    IoError(std::io::Error),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::MissingFile => write!(f, "No file was selected for upload"),
            UploadError::DisallowedExtension(name) => {
                write!(f, "File type not allowed: {}", name)
            }
            UploadError::InvalidFilename(name) => write!(f, "Invalid file name: {}", name),
            UploadError::IoError(e) => write!(f, "Upload IO error: {}", e),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::IoError(err)
    }
}

/// Failures surfaced by the HTTP layer.
///
/// Handlers reject with `WebError` and the recovery filter turns it into a
/// response using [`WebError::status`].
#[derive(Debug)]
pub enum WebError {
    Unauthorized,
    NotFound,
    PayloadTooLarge,
    BadRequest(String),
    Upload(UploadError),
    Storage(StorageError),
    Internal(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebError::NotFound => StatusCode::NOT_FOUND,
            WebError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Upload(UploadError::IoError(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::Upload(_) => StatusCode::BAD_REQUEST,
            WebError::Storage(_) | WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Unauthorized => write!(f, "Unauthorized"),
            WebError::NotFound => write!(f, "Not found"),
            WebError::PayloadTooLarge => write!(f, "Request body too large"),
            WebError::BadRequest(e) => write!(f, "Bad request: {}", e),
            WebError::Upload(e) => write!(f, "{}", e),
            WebError::Storage(e) => write!(f, "Storage error: {}", e),
            WebError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

impl warp::reject::Reject for WebError {}

impl From<StorageError> for WebError {
    fn from(err: StorageError) -> Self {
        WebError::Storage(err)
    }
}

impl From<UploadError> for WebError {
    fn from(err: UploadError) -> Self {
        WebError::Upload(err)
    }
}
