pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod search;
pub mod storage;
pub mod widget;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use storage::{Category, Note, NoteSummary, StorageHandle};
