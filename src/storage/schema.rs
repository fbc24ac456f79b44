use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::palette::SEED_CATEGORIES;
use crate::config::CategoryOptions;

const SEEDED_VERSION: i64 = 1;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            modified_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS notes_category_idx ON notes(category);
        CREATE INDEX IF NOT EXISTS notes_modified_idx ON notes(modified_at, id);

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            color INTEGER NOT NULL
        );
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}

/// Inserts the default and stock categories once per database. Completion is
/// recorded in `user_version` in the same transaction, so an interrupted
/// seed is retried on the next start.
pub fn seed_categories(conn: &Connection, options: &CategoryOptions) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("starting seed transaction")?;
    let seeded: i64 = tx
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("reading seed marker")?;
    if seeded >= SEEDED_VERSION {
        return Ok(());
    }

    let existing: Option<i64> = tx
        .query_row("SELECT id FROM categories LIMIT 1", [], |row| row.get(0))
        .optional()
        .context("checking for existing categories")?;
    if existing.is_none() {
        tracing::info!(default = %options.default_name, "seeding first-run categories");
        let defaults = std::iter::once((options.default_name.as_str(), options.default_color))
            .chain(
                SEED_CATEGORIES
                    .iter()
                    .copied()
                    .filter(|(name, _)| *name != options.default_name),
            );
        for (name, color) in defaults {
            tx.execute(
                "INSERT INTO categories (name, color) VALUES (?1, ?2)",
                params![name, color],
            )
            .with_context(|| format!("inserting seed category {name}"))?;
        }
    }
    tx.pragma_update(None, "user_version", SEEDED_VERSION)
        .context("recording seed marker")?;
    tx.commit().context("committing seed categories")?;
    Ok(())
}
