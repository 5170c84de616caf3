//! SeaORM entity models used by the database storage backend.
//!
//! These structs map to the SQLite tables created by `database_storage`:
//! - `entries`: posted text entries
//! - `attachments`: uploaded files, linked to entries by `resid`

use sea_orm::entity::prelude::*;

use crate::storage::types::Entry;

/// Entries table entity model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "entries")]
pub struct Model {
    /// Auto-increment row id, gives the insertion order
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Public identifier used in URLs
    pub resid: String,
    pub title: String,
    pub text: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Entry {
    fn from(model: Model) -> Self {
        Entry {
            resid: model.resid,
            title: model.title,
            text: model.text,
        }
    }
}

/// Attachments table entity models.
pub mod attachments {
    use sea_orm::entity::prelude::*;

    use crate::storage::types::Attachment;

    /// Metadata of one uploaded file.
    ///
    /// `resid` is not declared as a foreign key: attachments may point at an
    /// entry that does not exist.
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "attachments")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub resid: String,
        pub title: String,
        /// Sanitized name of the file inside the upload directory
        pub filename: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for Attachment {
        fn from(model: Model) -> Self {
            Attachment {
                resid: model.resid,
                title: model.title,
                filename: model.filename,
            }
        }
    }
}
