//! Orchestration over the Reddit client, the database and the AI assistant.

mod explorer;
mod images;
mod importer;
mod watcher;

mod tests;

pub use explorer::Explorer;
pub use images::ImageCache;
pub use importer::LinkImporter;
pub use watcher::{count_new_posts, WatchUpdate, Watcher};
