//! Error types returned by the note repository.

use rusqlite::ErrorCode;
use strum::Display;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Coarse classification used by presentation surfaces to pick a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    DuplicateName,
    InvalidInput,
    StorageUnavailable,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("note #{0} not found")]
    NoteNotFound(i64),

    #[error("category #{0} not found")]
    CategoryNotFound(i64),

    #[error("category '{0}' does not exist")]
    UnknownCategory(String),

    #[error("category '{0}' already exists")]
    DuplicateName(String),

    #[error("category name cannot be empty")]
    EmptyName,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NoteNotFound(_)
            | StorageError::CategoryNotFound(_)
            | StorageError::UnknownCategory(_) => ErrorKind::NotFound,
            StorageError::DuplicateName(_) => ErrorKind::DuplicateName,
            StorageError::EmptyName => ErrorKind::InvalidInput,
            StorageError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::NotFound => 2,
            ErrorKind::DuplicateName => 3,
            ErrorKind::InvalidInput => 4,
            ErrorKind::StorageUnavailable => 5,
        }
    }

    /// Maps a UNIQUE violation on `categories.name` to `DuplicateName`.
    pub(crate) fn from_category_write(err: rusqlite::Error, name: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == ErrorCode::ConstraintViolation =>
            {
                StorageError::DuplicateName(name.to_string())
            }
            _ => StorageError::StorageUnavailable(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants_share_a_kind() {
        assert!(StorageError::NoteNotFound(3).is_not_found());
        assert!(StorageError::CategoryNotFound(3).is_not_found());
        assert!(StorageError::UnknownCategory("Work".into()).is_not_found());
        assert!(!StorageError::DuplicateName("Work".into()).is_not_found());
    }

    #[test]
    fn kinds_render_as_kebab_case() {
        assert_eq!(ErrorKind::DuplicateName.to_string(), "duplicate-name");
        assert_eq!(
            StorageError::EmptyName.kind().to_string(),
            "invalid-input"
        );
    }

    #[test]
    fn exit_codes_differ_per_kind() {
        assert_eq!(StorageError::NoteNotFound(1).exit_code(), 2);
        assert_eq!(StorageError::DuplicateName("x".into()).exit_code(), 3);
        assert_eq!(StorageError::EmptyName.exit_code(), 4);
    }
}
