use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::error_handling::types::StorageError;
use crate::storage::db_entities::{self as entries, attachments};
use crate::storage::storage_trait::Storage;
use crate::storage::types::{generate_resid, Attachment, Entry};

/// Statements run by [`DatabaseFile::init_schema`]. Existing tables are
/// dropped, so this resets the blog.
const SCHEMA: [&str; 4] = [
    "DROP TABLE IF EXISTS entries;",
    "CREATE TABLE entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resid TEXT NOT NULL,
        title TEXT NOT NULL,
        text TEXT NOT NULL
    );",
    "DROP TABLE IF EXISTS attachments;",
    "CREATE TABLE attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resid TEXT NOT NULL,
        title TEXT NOT NULL,
        filename TEXT NOT NULL
    );",
];

/// Location of the SQLite database.
///
/// No connection is kept around: every request opens its own through
/// [`DatabaseFile::with_storage`] and that connection is closed once the
/// request is done.
#[derive(Debug, Clone)]
pub struct DatabaseFile {
    path: PathBuf,
}

impl DatabaseFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // mode=rw refuses to create a missing file, so an uninitialised
    // database fails loudly instead of serving empty tables.
    fn url(&self, create: bool) -> String {
        let mode = if create { "rwc" } else { "rw" };
        format!("sqlite://{}?mode={}", self.path.display(), mode)
    }

    async fn open(&self, create: bool) -> Result<DatabaseStorage, StorageError> {
        let mut opts = ConnectOptions::new(self.url(create));
        opts.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let conn = Database::connect(opts).await.map_err(|e| {
            error!("Failed to open database {}: {}", self.path.display(), e);
            StorageError::ConnectionFailed
        })?;
        Ok(DatabaseStorage { conn })
    }

    /// Opens a connection to an already initialised database.
    pub async fn connect(&self) -> Result<DatabaseStorage, StorageError> {
        self.open(false).await
    }

    /// Runs `f` with a freshly opened connection and closes that connection
    /// afterwards, whatever `f` returned.
    pub async fn with_storage<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(DatabaseStorage) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StorageError>,
    {
        let storage = self.connect().await?;
        let handle = storage.clone();
        let result = f(storage).await;
        if let Err(e) = handle.close().await {
            warn!("Failed to close database {}: {}", self.path.display(), e);
        }
        result
    }

    /// Creates the database file (and its directory) when missing, then
    /// (re)creates the tables.
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create database dir {}: {}", parent.display(), e);
                StorageError::WriteFailed
            })?;
        }
        let storage = self.open(true).await?;
        let mut outcome = Ok(());
        for statement in SCHEMA {
            if let Err(e) = storage.conn.execute_unprepared(statement).await {
                error!("Schema statement failed: {}", e);
                outcome = Err(StorageError::SchemaFailed);
                break;
            }
        }
        if let Err(e) = storage.close().await {
            warn!("Failed to close database {}: {}", self.path.display(), e);
        }
        if outcome.is_ok() {
            info!("Initialized database at {}", self.path.display());
        }
        outcome
    }
}

/// ORM-backed `Storage` over one open connection.
#[derive(Clone)]
pub struct DatabaseStorage {
    conn: DatabaseConnection,
}

impl DatabaseStorage {
    pub async fn close(self) -> Result<(), StorageError> {
        self.conn.close().await.map_err(|e| {
            debug!("Close error: {}", e);
            StorageError::ConnectionFailed
        })
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn list_entries(&self) -> Result<Vec<Entry>, StorageError> {
        let rows = entries::Entity::find()
            .order_by_desc(entries::Column::Id)
            .all(&self.conn)
            .await
            .map_err(|e| {
                error!("Failed to list entries: {}", e);
                StorageError::ReadFailed
            })?;
        Ok(rows.into_iter().map(Entry::from).collect())
    }

    async fn create_entry(&self, title: &str, text: &str) -> Result<Entry, StorageError> {
        let row = entries::ActiveModel {
            resid: Set(generate_resid()),
            title: Set(title.to_string()),
            text: Set(text.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .map_err(|e| {
            error!("Failed to insert entry: {}", e);
            StorageError::WriteFailed
        })?;
        info!("Created entry {}", row.resid);
        Ok(row.into())
    }

    async fn get_entry(&self, resid: &str) -> Result<Option<Entry>, StorageError> {
        let row = entries::Entity::find()
            .filter(entries::Column::Resid.eq(resid))
            .order_by_desc(entries::Column::Id)
            .one(&self.conn)
            .await
            .map_err(|e| {
                error!("Failed to read entry {}: {}", resid, e);
                StorageError::ReadFailed
            })?;
        debug!("Lookup of entry {}: found={}", resid, row.is_some());
        Ok(row.map(Entry::from))
    }

    async fn list_attachments(&self, resid: &str) -> Result<Vec<Attachment>, StorageError> {
        let rows = attachments::Entity::find()
            .filter(attachments::Column::Resid.eq(resid))
            .order_by_desc(attachments::Column::Id)
            .all(&self.conn)
            .await
            .map_err(|e| {
                error!("Failed to list attachments of {}: {}", resid, e);
                StorageError::ReadFailed
            })?;
        Ok(rows.into_iter().map(Attachment::from).collect())
    }

    async fn add_attachment(&self, attachment: &Attachment) -> Result<(), StorageError> {
        attachments::ActiveModel {
            resid: Set(attachment.resid.clone()),
            title: Set(attachment.title.clone()),
            filename: Set(attachment.filename.clone()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .map_err(|e| {
            error!("Failed to insert attachment {}: {}", attachment.filename, e);
            StorageError::WriteFailed
        })?;
        info!(
            "Attached {} to entry {}",
            attachment.filename, attachment.resid
        );
        Ok(())
    }
}
