use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::{AppConfig, ConfigPaths, StorageOptions};
use crate::display::{truncate_body, TimestampFormat};
use crate::error::{StorageError, StorageResult};
use crate::search::NoteFilter;

mod colors;
mod schema;

use colors::CategoryColors;

const NOTE_COLUMNS: &str = "id, title, body, category, created_at, modified_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub category: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds, never decreases across edits.
    pub modified_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Packed ARGB.
    pub color: u32,
}

/// Bounded rendering of a note for small surfaces such as widgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteSummary {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub category: String,
    pub color: Option<u32>,
    pub modified: String,
}

struct RepositoryOptions {
    storage: StorageOptions,
    default_category: String,
    default_color: u32,
    timestamp: TimestampFormat,
    summary_max_chars: usize,
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<RepositoryOptions>,
    colors: Arc<CategoryColors>,
}

impl StorageHandle {
    pub fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options.storage)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction; any error rolls back.
    fn with_write_transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StorageResult<T>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn default_category(&self) -> &str {
        &self.options.default_category
    }

    pub fn timestamp_format(&self) -> &TimestampFormat {
        &self.options.timestamp
    }

    pub fn category_color(&self, name: &str) -> Option<u32> {
        self.colors.get(name)
    }

    pub fn list_notes(
        &self,
        category: Option<&str>,
        query: Option<&str>,
    ) -> StorageResult<Vec<Note>> {
        self.list_matching(&NoteFilter::new(category, query))
    }

    pub fn list_matching(&self, filter: &NoteFilter) -> StorageResult<Vec<Note>> {
        let selection = filter.selection();
        let direction = self.options.storage.sort_direction.as_sql();
        let where_clause = selection
            .clause
            .as_deref()
            .map(|clause| format!("WHERE {clause}"))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {NOTE_COLUMNS}
             FROM notes
             {where_clause}
             ORDER BY modified_at {direction}, id {direction}"
        );
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let notes = stmt
                .query_map(params_from_iter(selection.args.iter()), note_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(
                category = ?filter.category,
                query = ?filter.query,
                results = notes.len(),
                "listed notes"
            );
            Ok(notes)
        })
    }

    pub fn note_count(&self) -> StorageResult<usize> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    pub fn get_note(&self, note_id: i64) -> StorageResult<Note> {
        self.with_connection(|conn| fetch_note(conn, note_id))
    }

    pub fn create_note(&self, title: &str, body: &str) -> StorageResult<Note> {
        let category = self.options.default_category.clone();
        self.create_note_in(title, body, &category)
    }

    /// Inserts a note directly into `category`, which must exist or be the
    /// default category name. Nothing is written when the check fails.
    pub fn create_note_in(&self, title: &str, body: &str, category: &str) -> StorageResult<Note> {
        let now = now_millis();
        let default = self.options.default_category.as_str();
        self.with_write_transaction(|tx| {
            if category != default && find_category_by_name(tx, category)?.is_none() {
                return Err(StorageError::UnknownCategory(category.to_string()));
            }
            tx.execute(
                "INSERT INTO notes (title, body, category, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![title, body, category, now],
            )?;
            let id = tx.last_insert_rowid();
            tracing::debug!(id, category, "created note");
            Ok(Note {
                id,
                title: title.to_string(),
                body: body.to_string(),
                category: category.to_string(),
                created_at: now,
                modified_at: now,
            })
        })
    }

    /// Replaces the note's fields. The category must exist or be the default
    /// category name.
    pub fn update_note(
        &self,
        note_id: i64,
        title: &str,
        body: &str,
        category: &str,
    ) -> StorageResult<Note> {
        let now = now_millis();
        let default = self.options.default_category.as_str();
        self.with_write_transaction(|tx| {
            let exists = tx
                .query_row("SELECT 1 FROM notes WHERE id = ?1", params![note_id], |_| {
                    Ok(())
                })
                .optional()?
                .is_some();
            if !exists {
                return Err(StorageError::NoteNotFound(note_id));
            }
            if category != default && find_category_by_name(tx, category)?.is_none() {
                return Err(StorageError::UnknownCategory(category.to_string()));
            }
            tx.execute(
                "UPDATE notes
                 SET title = ?1, body = ?2, category = ?3, modified_at = MAX(modified_at, ?4)
                 WHERE id = ?5",
                params![title, body, category, now, note_id],
            )?;
            tracing::debug!(id = note_id, category, "updated note");
            fetch_note(tx, note_id)
        })
    }

    pub fn delete_note(&self, note_id: i64) -> StorageResult<()> {
        self.with_connection(|conn| {
            let deleted = conn.execute("DELETE FROM notes WHERE id = ?1", params![note_id])?;
            if deleted == 0 {
                return Err(StorageError::NoteNotFound(note_id));
            }
            tracing::debug!(id = note_id, "deleted note");
            Ok(())
        })
    }

    pub fn get_note_summary(&self, note_id: i64) -> StorageResult<NoteSummary> {
        let note = self.get_note(note_id)?;
        Ok(NoteSummary {
            id: note.id,
            body: truncate_body(&note.body, self.options.summary_max_chars),
            color: self.colors.get(&note.category),
            modified: self.options.timestamp.format(note.modified_at),
            title: note.title,
            category: note.category,
        })
    }

    /// Default category first, then by name. Never empty: without any rows
    /// the implied default category (id 0) is returned.
    pub fn list_categories(&self) -> StorageResult<Vec<Category>> {
        let default = self.options.default_category.as_str();
        let mut categories = self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, color
                 FROM categories
                 ORDER BY name = ?1 DESC, name COLLATE NOCASE, name",
            )?;
            let rows = stmt
                .query_map(params![default], category_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        if categories.is_empty() {
            categories.push(Category {
                id: 0,
                name: default.to_string(),
                color: self.options.default_color,
            });
        }
        Ok(categories)
    }

    pub fn create_category(&self, name: &str) -> StorageResult<Category> {
        self.create_category_with_color(name, self.options.default_color)
    }

    pub fn create_category_with_color(&self, name: &str, color: u32) -> StorageResult<Category> {
        let name = normalize_category_name(name)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if find_category_by_name(&tx, &name)?.is_some() {
            return Err(StorageError::DuplicateName(name));
        }
        tx.execute(
            "INSERT INTO categories (name, color) VALUES (?1, ?2)",
            params![name, color],
        )
        .map_err(|err| StorageError::from_category_write(err, &name))?;
        let id = tx.last_insert_rowid();

        let mut colors = self.colors.write();
        tx.commit()?;
        colors.insert(&name, color);
        tracing::info!(id, name = %name, "created category");
        Ok(Category { id, name, color })
    }

    /// Renames and/or recolors a category. A rename repoints every note of the
    /// old name within the same transaction.
    pub fn update_category(
        &self,
        category_id: i64,
        new_name: &str,
        new_color: u32,
    ) -> StorageResult<Category> {
        let new_name = normalize_category_name(new_name)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = find_category_by_id(&tx, category_id)?
            .ok_or(StorageError::CategoryNotFound(category_id))?;

        let renamed = current.name != new_name;
        let mut moved = 0;
        if renamed {
            if find_category_by_name(&tx, &new_name)?.is_some() {
                return Err(StorageError::DuplicateName(new_name));
            }
            moved = reassign_notes(&tx, &current.name, &new_name)?;
        }
        tx.execute(
            "UPDATE categories SET name = ?1, color = ?2 WHERE id = ?3",
            params![new_name, new_color, category_id],
        )
        .map_err(|err| StorageError::from_category_write(err, &new_name))?;

        let mut colors = self.colors.write();
        tx.commit()?;
        colors.rename(&current.name, &new_name, new_color);
        tracing::info!(
            id = category_id,
            from = %current.name,
            to = %new_name,
            moved,
            "updated category"
        );
        Ok(Category {
            id: category_id,
            name: new_name,
            color: new_color,
        })
    }

    /// Moves the category's notes to the default category, then removes it.
    /// Returns the number of notes moved.
    pub fn delete_category(&self, category_id: i64) -> StorageResult<usize> {
        let default = self.options.default_category.as_str();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = find_category_by_id(&tx, category_id)?
            .ok_or(StorageError::CategoryNotFound(category_id))?;

        let moved = if current.name == default {
            0
        } else {
            reassign_notes(&tx, &current.name, default)?
        };
        tx.execute(
            "DELETE FROM categories WHERE id = ?1",
            params![category_id],
        )?;

        let mut colors = self.colors.write();
        tx.commit()?;
        colors.remove(&current.name);
        tracing::info!(id = category_id, name = %current.name, moved, "deleted category");
        Ok(moved)
    }
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        category: row.get(3)?,
        created_at: row.get(4)?,
        modified_at: row.get(5)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
    })
}

fn fetch_note(conn: &Connection, note_id: i64) -> StorageResult<Note> {
    conn.query_row(
        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
        params![note_id],
        note_from_row,
    )
    .optional()?
    .ok_or(StorageError::NoteNotFound(note_id))
}

fn find_category_by_id(conn: &Connection, category_id: i64) -> StorageResult<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name, color FROM categories WHERE id = ?1",
            params![category_id],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

fn find_category_by_name(conn: &Connection, name: &str) -> StorageResult<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name, color FROM categories WHERE name = ?1",
            params![name],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

fn reassign_notes(conn: &Connection, from: &str, to: &str) -> StorageResult<usize> {
    let moved = conn.execute(
        "UPDATE notes SET category = ?1 WHERE category = ?2",
        params![to, from],
    )?;
    Ok(moved)
}

fn normalize_category_name(name: &str) -> StorageResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StorageError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn load_categories(conn: &Connection) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name, color FROM categories")?;
    let rows = stmt.query_map([], category_from_row)?;
    rows.collect()
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn init(paths: &ConfigPaths, config: &AppConfig) -> Result<StorageHandle> {
    let db_path = &paths.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, &config.storage).context("configuring sqlite connection")?;
    schema::apply(&conn)?;
    if config.categories.seed_defaults {
        schema::seed_categories(&conn, &config.categories)?;
    }
    let categories = load_categories(&conn).context("loading category colors")?;
    tracing::debug!(categories = categories.len(), path = %db_path.display(), "storage ready");

    let timestamp = TimestampFormat::parse(&config.display.timestamp_format).unwrap_or_default();
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(RepositoryOptions {
            storage: config.storage.clone(),
            default_category: config.categories.default_name.clone(),
            default_color: config.categories.default_color,
            timestamp,
            summary_max_chars: config.display.summary_max_chars,
        }),
        colors: Arc::new(CategoryColors::from_categories(&categories)),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SortDirection, DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_NAME};
    use crate::display::{ELLIPSIS, UNKNOWN_TIME};
    use assert_matches::assert_matches;
    use std::thread;
    use tempfile::TempDir;

    fn init_with(config: &AppConfig) -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::under(temp.path());
        paths.ensure_directories()?;
        let storage = init(&paths, config)?;
        Ok((temp, storage))
    }

    fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        init_with(&AppConfig::default())
    }

    fn add_note(
        storage: &StorageHandle,
        title: &str,
        body: &str,
        category: &str,
    ) -> anyhow::Result<Note> {
        let note = storage.create_note(title, body)?;
        Ok(storage.update_note(note.id, title, body, category)?)
    }

    fn set_modified(storage: &StorageHandle, note_id: i64, modified_at: i64) -> anyhow::Result<()> {
        let conn = storage.connect()?;
        conn.execute(
            "UPDATE notes SET modified_at = ?1 WHERE id = ?2",
            params![modified_at, note_id],
        )?;
        Ok(())
    }

    fn category_id(storage: &StorageHandle, name: &str) -> anyhow::Result<i64> {
        storage
            .list_categories()?
            .into_iter()
            .find(|category| category.name == name)
            .map(|category| category.id)
            .ok_or_else(|| anyhow::anyhow!("category {name} missing"))
    }

    #[test]
    fn created_notes_appear_exactly_once() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let first = storage.create_note("First", "one")?;
        let second = storage.create_note("Second", "two")?;

        let notes = storage.list_notes(None, None)?;
        assert_eq!(notes.len(), 2);
        for id in [first.id, second.id] {
            assert_eq!(notes.iter().filter(|note| note.id == id).count(), 1);
        }
        assert_eq!(storage.note_count()?, 2);
        Ok(())
    }

    #[test]
    fn new_notes_use_default_category_and_current_time() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = storage.create_note("", "untitled body")?;
        assert_eq!(note.category, DEFAULT_CATEGORY_NAME);
        assert!(note.modified_at > 0);
        assert_eq!(note.created_at, note.modified_at);
        assert_eq!(storage.get_note(note.id)?, note);
        Ok(())
    }

    #[test]
    fn listing_orders_by_modification_time() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let old = storage.create_note("old", "")?;
        let mid = storage.create_note("mid", "")?;
        let new = storage.create_note("new", "")?;
        set_modified(&storage, old.id, 1_000)?;
        set_modified(&storage, mid.id, 2_000)?;
        set_modified(&storage, new.id, 3_000)?;

        let ids = storage
            .list_notes(None, None)?
            .into_iter()
            .map(|note| note.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![new.id, mid.id, old.id]);

        // Equal timestamps fall back to id so repeated calls agree.
        set_modified(&storage, old.id, 3_000)?;
        let first = storage.list_notes(None, None)?;
        let second = storage.list_notes(None, None)?;
        assert_eq!(first, second);
        assert_eq!(first[0].id, new.id);
        assert_eq!(first[1].id, old.id);
        Ok(())
    }

    #[test]
    fn ascending_sort_is_configurable() -> anyhow::Result<()> {
        let mut config = AppConfig::default();
        config.storage.sort_direction = SortDirection::Ascending;
        let (_temp, storage) = init_with(&config)?;
        let a = storage.create_note("a", "")?;
        let b = storage.create_note("b", "")?;
        set_modified(&storage, a.id, 5_000)?;
        set_modified(&storage, b.id, 4_000)?;

        let ids = storage
            .list_notes(None, None)?
            .into_iter()
            .map(|note| note.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![b.id, a.id]);
        Ok(())
    }

    #[test]
    fn category_filter_and_search_combine_with_and() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.create_category("Personal")?;
        let q1 = add_note(&storage, "Q1 budget", "...", "Work")?;
        let report = add_note(&storage, "Budget report", "...", "Personal")?;
        let sync = add_note(&storage, "Team sync", "budget talk", "Work")?;

        let mut ids = storage
            .list_notes(Some("Work"), Some("budget"))?
            .into_iter()
            .map(|note| note.id)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        assert_eq!(ids, vec![q1.id, sync.id]);
        assert!(!ids.contains(&report.id));

        let personal = storage.list_notes(Some("Personal"), None)?;
        assert_eq!(personal.len(), 1);
        assert_eq!(personal[0].id, report.id);
        Ok(())
    }

    #[test]
    fn search_is_case_sensitive_substring() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.create_note("Budget report", "numbers")?;
        let lower = storage.create_note("notes", "the budget")?;

        let hits = storage.list_notes(None, Some("budget"))?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, lower.id);

        assert_eq!(storage.list_notes(None, Some("Budget"))?.len(), 1);
        assert_eq!(storage.list_notes(None, Some("%"))?.len(), 0);
        assert_eq!(storage.list_notes(None, Some(""))?.len(), 2);
        Ok(())
    }

    #[test]
    fn empty_results_are_not_errors() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert!(storage.list_notes(Some("Nowhere"), Some("x"))?.is_empty());
        Ok(())
    }

    #[test]
    fn update_refreshes_timestamp_without_moving_backwards() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = storage.create_note("draft", "")?;
        set_modified(&storage, note.id, 1)?;

        let updated = storage.update_note(note.id, "final", "body", "Work")?;
        assert!(updated.modified_at > 1);
        assert_eq!(updated.title, "final");
        assert_eq!(updated.category, "Work");

        let future = i64::MAX / 2;
        set_modified(&storage, note.id, future)?;
        let again = storage.update_note(note.id, "final", "body 2", "Work")?;
        assert_eq!(again.modified_at, future);
        Ok(())
    }

    #[test]
    fn update_missing_note_reports_not_found() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let result = storage.update_note(404, "t", "b", DEFAULT_CATEGORY_NAME);
        assert_matches!(result, Err(StorageError::NoteNotFound(404)));
        Ok(())
    }

    #[test]
    fn update_rejects_unknown_category_without_writing() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = storage.create_note("keep", "me")?;
        let result = storage.update_note(note.id, "changed", "changed", "Nowhere");
        assert_matches!(result, Err(StorageError::UnknownCategory(ref name)) if name == "Nowhere");
        assert_eq!(storage.get_note(note.id)?, note);
        Ok(())
    }

    #[test]
    fn delete_note_then_not_found() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = storage.create_note("gone", "")?;
        storage.delete_note(note.id)?;
        assert!(storage.list_notes(None, None)?.is_empty());
        assert_matches!(storage.delete_note(note.id), Err(StorageError::NoteNotFound(_)));
        assert_matches!(storage.get_note(note.id), Err(StorageError::NoteNotFound(_)));
        Ok(())
    }

    #[test]
    fn seeded_categories_list_default_first() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let names = storage
            .list_categories()?
            .into_iter()
            .map(|category| category.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["Default", "Ideas", "Life", "Shopping", "Study", "Work"]
        );
        assert_eq!(storage.category_color("Work"), Some(0xFF4C_AF50));
        assert_eq!(
            storage.category_color(DEFAULT_CATEGORY_NAME),
            Some(DEFAULT_CATEGORY_COLOR)
        );
        Ok(())
    }

    #[test]
    fn empty_category_table_implies_default() -> anyhow::Result<()> {
        let mut config = AppConfig::default();
        config.categories.seed_defaults = false;
        let (_temp, storage) = init_with(&config)?;

        let categories = storage.list_categories()?;
        assert_eq!(
            categories,
            vec![Category {
                id: 0,
                name: DEFAULT_CATEGORY_NAME.to_string(),
                color: DEFAULT_CATEGORY_COLOR,
            }]
        );
        assert_eq!(storage.category_color(DEFAULT_CATEGORY_NAME), None);
        Ok(())
    }

    #[test]
    fn duplicate_category_names_are_rejected() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let created = storage.create_category("Travel")?;
        assert_eq!(created.color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(storage.category_color("Travel"), Some(DEFAULT_CATEGORY_COLOR));

        assert_matches!(
            storage.create_category("Travel"),
            Err(StorageError::DuplicateName(ref name)) if name == "Travel"
        );
        assert_matches!(
            storage.create_category("  Travel "),
            Err(StorageError::DuplicateName(_))
        );
        // Uniqueness is case-sensitive.
        storage.create_category("travel")?;
        Ok(())
    }

    #[test]
    fn blank_category_names_are_rejected() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert_matches!(storage.create_category("   "), Err(StorageError::EmptyName));
        let work = category_id(&storage, "Work")?;
        assert_matches!(
            storage.update_category(work, "", 0xFF00_0000),
            Err(StorageError::EmptyName)
        );
        Ok(())
    }

    #[test]
    fn rename_repoints_notes_and_colors() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let a = add_note(&storage, "a", "", "Work")?;
        let b = add_note(&storage, "b", "", "Work")?;
        let other = add_note(&storage, "c", "", "Life")?;
        let work = category_id(&storage, "Work")?;

        let renamed = storage.update_category(work, "Office", 0xFFE9_1E63)?;
        assert_eq!(renamed.name, "Office");

        assert!(storage.list_notes(Some("Work"), None)?.is_empty());
        let mut moved = storage
            .list_notes(Some("Office"), None)?
            .into_iter()
            .map(|note| note.id)
            .collect::<Vec<_>>();
        moved.sort_unstable();
        assert_eq!(moved, vec![a.id, b.id]);
        assert_eq!(storage.get_note(other.id)?.category, "Life");

        assert_eq!(storage.category_color("Work"), None);
        assert_eq!(storage.category_color("Office"), Some(0xFFE9_1E63));
        Ok(())
    }

    #[test]
    fn recolor_without_rename_keeps_notes() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = add_note(&storage, "a", "", "Ideas")?;
        let ideas = category_id(&storage, "Ideas")?;
        storage.update_category(ideas, "Ideas", 0xFF00_9688)?;
        assert_eq!(storage.get_note(note.id)?.category, "Ideas");
        assert_eq!(storage.category_color("Ideas"), Some(0xFF00_9688));
        Ok(())
    }

    #[test]
    fn rename_onto_existing_name_changes_nothing() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = add_note(&storage, "a", "", "Work")?;
        let work = category_id(&storage, "Work")?;

        assert_matches!(
            storage.update_category(work, "Life", 0xFF00_0000),
            Err(StorageError::DuplicateName(ref name)) if name == "Life"
        );
        assert_eq!(storage.get_note(note.id)?.category, "Work");
        assert_eq!(storage.category_color("Work"), Some(0xFF4C_AF50));
        Ok(())
    }

    #[test]
    fn update_missing_category_reports_not_found() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert_matches!(
            storage.update_category(999, "Ghost", 0),
            Err(StorageError::CategoryNotFound(999))
        );
        Ok(())
    }

    #[test]
    fn delete_category_moves_notes_to_default() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let a = add_note(&storage, "a", "", "Shopping")?;
        let b = add_note(&storage, "b", "", "Shopping")?;
        let shopping = category_id(&storage, "Shopping")?;

        let moved = storage.delete_category(shopping)?;
        assert_eq!(moved, 2);

        let notes = storage.list_notes(None, None)?;
        assert!(notes.iter().all(|note| note.category != "Shopping"));
        for id in [a.id, b.id] {
            assert_eq!(storage.get_note(id)?.category, DEFAULT_CATEGORY_NAME);
        }
        assert!(storage
            .list_categories()?
            .iter()
            .all(|category| category.name != "Shopping"));
        assert_eq!(storage.category_color("Shopping"), None);
        Ok(())
    }

    #[test]
    fn delete_missing_category_has_no_effect() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        add_note(&storage, "a", "", "Work")?;
        let notes_before = storage.list_notes(None, None)?;
        let categories_before = storage.list_categories()?;

        assert_matches!(
            storage.delete_category(12_345),
            Err(StorageError::CategoryNotFound(12_345))
        );
        assert_eq!(storage.list_notes(None, None)?, notes_before);
        assert_eq!(storage.list_categories()?, categories_before);
        Ok(())
    }

    #[test]
    fn summary_truncates_long_bodies() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let long = storage.create_note("long", &"x".repeat(150))?;
        let short = storage.create_note("short", &"y".repeat(80))?;

        let summary = storage.get_note_summary(long.id)?;
        assert_eq!(summary.body, format!("{}{ELLIPSIS}", "x".repeat(100)));
        assert_eq!(summary.category, DEFAULT_CATEGORY_NAME);
        assert_eq!(summary.color, Some(DEFAULT_CATEGORY_COLOR));

        assert_eq!(storage.get_note_summary(short.id)?.body, "y".repeat(80));
        Ok(())
    }

    #[test]
    fn summary_marks_missing_timestamps_as_unknown() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = storage.create_note("t", "b")?;
        set_modified(&storage, note.id, 0)?;
        assert_eq!(storage.get_note_summary(note.id)?.modified, UNKNOWN_TIME);
        assert_matches!(
            storage.get_note_summary(note.id + 1),
            Err(StorageError::NoteNotFound(_))
        );
        Ok(())
    }

    #[test]
    fn clones_share_the_color_cache() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let other = storage.clone();
        storage.create_category("Garden")?;
        assert_eq!(other.category_color("Garden"), Some(DEFAULT_CATEGORY_COLOR));
        Ok(())
    }

    #[test]
    fn reopening_rebuilds_colors_without_reseeding() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::under(temp.path());
        paths.ensure_directories()?;
        let config = AppConfig::default();
        {
            let storage = init(&paths, &config)?;
            storage.create_category_with_color("Garden", 0xFF8B_C34A)?;
            let work = category_id(&storage, "Work")?;
            storage.delete_category(work)?;
        }

        let reopened = init(&paths, &config)?;
        assert_eq!(reopened.category_color("Garden"), Some(0xFF8B_C34A));
        assert_eq!(reopened.category_color("Work"), None);
        assert_eq!(reopened.list_categories()?.len(), 6);
        Ok(())
    }

    #[test]
    fn concurrent_readers_never_see_partial_rename() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        for i in 0..20 {
            add_note(&storage, &format!("note {i}"), "", "Work")?;
        }
        let work = category_id(&storage, "Work")?;

        let writer = {
            let storage = storage.clone();
            thread::spawn(move || -> StorageResult<()> {
                for round in 0..30 {
                    let name = if round % 2 == 0 { "Office" } else { "Work" };
                    storage.update_category(work, name, 0xFF4C_AF50)?;
                }
                Ok(())
            })
        };

        for _ in 0..60 {
            let notes = storage.list_notes(None, None)?;
            assert_eq!(notes.len(), 20);
            let first = &notes[0].category;
            assert!(
                notes.iter().all(|note| &note.category == first),
                "observed a half-applied rename"
            );
        }

        writer
            .join()
            .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
        let names = storage
            .list_notes(None, None)?
            .into_iter()
            .map(|note| note.category)
            .collect::<Vec<_>>();
        assert!(names.iter().all(|name| name == "Work"));
        Ok(())
    }

    #[test]
    fn create_in_category_checks_category_in_same_write() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = storage.create_note_in("plan", "body", "Study")?;
        assert_eq!(storage.get_note(note.id)?.category, "Study");

        let default = storage.create_note_in("plain", "", DEFAULT_CATEGORY_NAME)?;
        assert_eq!(default.category, DEFAULT_CATEGORY_NAME);

        let study = category_id(&storage, "Study")?;
        storage.delete_category(study)?;
        assert_matches!(
            storage.create_note_in("late", "", "Study"),
            Err(StorageError::UnknownCategory(ref name)) if name == "Study"
        );
        assert_eq!(storage.note_count()?, 2);
        Ok(())
    }

    #[test]
    fn failed_reassignment_keeps_category_intact() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let note = add_note(&storage, "pinned", "", "Work")?;
        let work = category_id(&storage, "Work")?;
        storage.connect()?.execute_batch(
            "CREATE TRIGGER block_reassign BEFORE UPDATE OF category ON notes
             BEGIN SELECT RAISE(ABORT, 'reassignment blocked'); END;",
        )?;

        assert_matches!(
            storage.delete_category(work),
            Err(StorageError::StorageUnavailable(_))
        );
        assert_matches!(
            storage.update_category(work, "Office", 0xFFE9_1E63),
            Err(StorageError::StorageUnavailable(_))
        );

        assert!(storage
            .list_categories()?
            .iter()
            .any(|category| category.id == work && category.name == "Work"));
        assert_eq!(storage.category_color("Work"), Some(0xFF4C_AF50));
        assert_eq!(storage.category_color("Office"), None);
        assert_eq!(storage.get_note(note.id)?.category, "Work");
        Ok(())
    }

    #[test]
    fn concurrent_readers_never_see_partial_delete() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut groups = Vec::new();
        for k in 0..5 {
            let name = format!("Errand {k}");
            let category = storage.create_category(&name)?;
            let mut members = Vec::new();
            for i in 0..4 {
                members.push(storage.create_note_in(&format!("{name} #{i}"), "", &name)?.id);
            }
            groups.push((category.id, name, members));
        }

        let writer = {
            let storage = storage.clone();
            let ids = groups.iter().map(|(id, _, _)| *id).collect::<Vec<_>>();
            thread::spawn(move || -> StorageResult<()> {
                for id in ids {
                    storage.delete_category(id)?;
                }
                Ok(())
            })
        };

        for _ in 0..60 {
            let notes = storage.list_notes(None, None)?;
            assert_eq!(notes.len(), 20);
            for (_, name, members) in &groups {
                let seen = notes
                    .iter()
                    .filter(|note| members.contains(&note.id))
                    .map(|note| note.category.as_str())
                    .collect::<Vec<_>>();
                assert_eq!(seen.len(), members.len());
                assert!(
                    seen.iter().all(|category| *category == name.as_str())
                        || seen.iter().all(|category| *category == DEFAULT_CATEGORY_NAME),
                    "observed a half-applied delete of {name}: {seen:?}"
                );
            }
        }

        writer
            .join()
            .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
        let notes = storage.list_notes(None, None)?;
        assert!(notes
            .iter()
            .all(|note| note.category == DEFAULT_CATEGORY_NAME));
        Ok(())
    }
}
