mod articles;
mod feeds;
mod schema;
mod settings;
mod translations;
mod types;

pub use articles::DEFAULT_RETENTION_DAYS;
pub use schema::Database;
pub use types::{
    Article, DatabaseError, Feed, NewArticle, Settings, SettingsUpdate, Translation,
    DEFAULT_CATEGORY,
};
