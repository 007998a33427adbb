use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::ThemeMode;

const THEME_MODE_KEY: &str = "theme_mode";

fn fetch_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("failed to read setting {key}"))
}

fn save_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .with_context(|| format!("failed to save setting {key}"))?;
    Ok(())
}

/// Stored theme preference. Missing or unrecognized values mean "follow the
/// system".
pub fn fetch_theme_mode(conn: &Connection) -> Result<ThemeMode> {
    let Some(raw) = fetch_setting(conn, THEME_MODE_KEY)? else {
        return Ok(ThemeMode::default());
    };

    Ok(raw.parse().unwrap_or_else(|_| {
        tracing::warn!(value = %raw, "ignoring unknown theme mode");
        ThemeMode::default()
    }))
}

pub fn save_theme_mode(conn: &Connection, mode: ThemeMode) -> Result<()> {
    save_setting(conn, THEME_MODE_KEY, mode.as_str())?;
    tracing::debug!(theme = mode.as_str(), "saved theme mode");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn theme_defaults_then_persists() {
        let conn = open_in_memory().expect("db");
        assert_eq!(fetch_theme_mode(&conn).unwrap(), ThemeMode::System);

        save_theme_mode(&conn, ThemeMode::Dark).unwrap();
        save_theme_mode(&conn, ThemeMode::Light).unwrap();
        assert_eq!(fetch_theme_mode(&conn).unwrap(), ThemeMode::Light);
    }

    #[test]
    fn garbage_theme_falls_back_to_system() {
        let conn = open_in_memory().expect("db");
        save_setting(&conn, THEME_MODE_KEY, "NEON").unwrap();
        assert_eq!(fetch_theme_mode(&conn).unwrap(), ThemeMode::System);
    }
}
