use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};

use super::family::ensure_self;
use crate::models::CategoryKind;

/// Built-in categories seeded on first launch, with their display order.
pub const DEFAULT_CATEGORIES: &[(&str, i64)] = &[
    ("Overall Day", 0),
    ("Physical Activity", 10),
    ("Emotional State", 20),
    ("Self-Care", 30),
];

/// Index statements run after the tables exist.
const INDEXES: &[(&str, &str)] = &[
    (
        "categories_member",
        "CREATE INDEX IF NOT EXISTS idx_categories_member ON categories(family_member_id)",
    ),
    (
        "categories_active_order",
        "CREATE INDEX IF NOT EXISTS idx_categories_active_order ON categories(is_active, display_order)",
    ),
    (
        "ratings_date",
        "CREATE INDEX IF NOT EXISTS idx_daily_ratings_date ON daily_ratings(date)",
    ),
    (
        "ratings_category",
        "CREATE INDEX IF NOT EXISTS idx_daily_ratings_category ON daily_ratings(category_id)",
    ),
    (
        "ratings_unique_triple",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_ratings_triple
         ON daily_ratings(date, family_member_id, category_id)",
    ),
];

/// Ensure the database file exists, run lazy migrations, seed the defaults,
/// and return a live connection.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    tracing::info!(path = %path.display(), "opened journal database");
    prepare(conn)
}

/// Same bootstrap against a throwaway in-memory database.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    prepare(conn)
}

fn prepare(conn: Connection) -> Result<Connection> {
    // Referential integrity checks behave the same in tests and production.
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;
    create_schema(&conn)?;
    seed_defaults(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS family_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            relationship TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            display_order INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )",
        [],
    )
    .context("failed to create family_members table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            family_member_id INTEGER,
            display_order INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            FOREIGN KEY(family_member_id) REFERENCES family_members(id) ON DELETE SET NULL
        )",
        [],
    )
    .context("failed to create categories table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS daily_ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            family_member_id INTEGER NOT NULL,
            category_id INTEGER,
            rating_value TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY(family_member_id) REFERENCES family_members(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL
        )",
        [],
    )
    .context("failed to create daily_ratings table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create settings table")?;

    for (name, sql) in INDEXES {
        conn.execute(sql, [])
            .with_context(|| format!("failed to create index {name}"))?;
    }

    Ok(())
}

/// Insert the built-in categories and the "Me" member when they are missing.
/// Safe to run on every start.
fn seed_defaults(conn: &Connection) -> Result<()> {
    let defaults: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM categories WHERE kind = ?1",
            params![CategoryKind::Default],
            |row| row.get(0),
        )
        .context("failed to count default categories")?;

    if defaults == 0 {
        let created_at = now_millis();
        for (name, order) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (name, kind, display_order, is_active, created_at)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![name, CategoryKind::Default, order, created_at],
            )
            .context("failed to seed default category")?;
        }
        tracing::info!(count = DEFAULT_CATEGORIES.len(), "seeded default categories");
    }

    ensure_self(conn)?;
    Ok(())
}

/// Wall-clock timestamp stored in `created_at` / `updated_at` columns.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
