//! CSV and JSON export of the rating history.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{fetch_all_categories, fetch_all_members, fetch_ratings_for_export};
use crate::error::StoreError;

const CSV_HEADER: [&str; 4] = ["Date", "Family Member", "Category", "Rating"];
const UNKNOWN_NAME: &str = "Unknown";
pub const NO_DATA_MESSAGE: &str = "No data to export for the selected period";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            ExportFormat::Csv => ExportFormat::Json,
            ExportFormat::Json => ExportFormat::Csv,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportRange {
    #[default]
    AllTime,
    Last30Days,
    Last90Days,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl ExportRange {
    /// Concrete bounds for the query, `None` meaning everything.
    pub fn resolve(self, today: NaiveDate) -> Result<Option<(NaiveDate, NaiveDate)>, StoreError> {
        match self {
            ExportRange::AllTime => Ok(None),
            ExportRange::Last30Days => Ok(Some((today - Days::new(30), today))),
            ExportRange::Last90Days => Ok(Some((today - Days::new(90), today))),
            ExportRange::Custom { start, end } if start > end => Err(StoreError::Invalid(
                "Start date must be before end date".into(),
            )),
            ExportRange::Custom { start, end } => Ok(Some((start, end))),
        }
    }

    pub fn label(self) -> String {
        match self {
            ExportRange::AllTime => "All time".to_string(),
            ExportRange::Last30Days => "Last 30 days".to_string(),
            ExportRange::Last90Days => "Last 90 days".to_string(),
            ExportRange::Custom { start, end } => format!("{start} to {end}"),
        }
    }

    /// Cycle through the presets. Leaving a custom range lands on all time;
    /// the last preset moves to a custom range seeded from `today`.
    pub fn next(self, today: NaiveDate) -> Self {
        match self {
            ExportRange::AllTime => ExportRange::Last30Days,
            ExportRange::Last30Days => ExportRange::Last90Days,
            ExportRange::Last90Days => ExportRange::Custom {
                start: today - Days::new(7),
                end: today,
            },
            ExportRange::Custom { .. } => ExportRange::AllTime,
        }
    }

    pub fn is_custom(self) -> bool {
        matches!(self, ExportRange::Custom { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub date: NaiveDate,
    pub family_member: String,
    pub category: String,
    pub rating: String,
    pub emoji: String,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    ratings: &'a [ExportRow],
}

/// Where an export landed and how many ratings it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub rows: usize,
}

/// Load the ratings in `range` with member and category names resolved.
/// Names come from every row, soft-deleted ones included.
pub fn collect_export_rows(
    conn: &Connection,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<ExportRow>> {
    let members: HashMap<i64, String> = fetch_all_members(conn)?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();
    let categories: HashMap<i64, String> = fetch_all_categories(conn)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let rows = fetch_ratings_for_export(conn, range)?
        .into_iter()
        .map(|rating| ExportRow {
            date: rating.date,
            family_member: members
                .get(&rating.family_member_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            category: rating
                .category_id
                .and_then(|id| categories.get(&id).cloned())
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            rating: rating.value.label().to_string(),
            emoji: rating.value.emoji().to_string(),
        })
        .collect();

    Ok(rows)
}

pub fn render_csv(rows: &[ExportRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADER)
        .context("failed to write csv header")?;
    for row in rows {
        let date = row.date.to_string();
        writer
            .write_record([
                date.as_str(),
                row.family_member.as_str(),
                row.category.as_str(),
                row.rating.as_str(),
            ])
            .context("failed to write csv row")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv: {}", err.error()))?;
    String::from_utf8(bytes).context("csv output is not valid utf-8")
}

pub fn render_json(rows: &[ExportRow]) -> Result<String> {
    serde_json::to_string_pretty(&ExportDocument { ratings: rows })
        .context("failed to serialize export")
}

pub fn export_csv(conn: &Connection, range: Option<(NaiveDate, NaiveDate)>) -> Result<String> {
    render_csv(&collect_export_rows(conn, range)?)
}

pub fn export_json(conn: &Connection, range: Option<(NaiveDate, NaiveDate)>) -> Result<String> {
    render_json(&collect_export_rows(conn, range)?)
}

pub fn export_file_name(format: ExportFormat, today: NaiveDate) -> String {
    format!("dayrater_export_{today}.{}", format.extension())
}

/// Write an export into `export_dir`. An empty selection is an error rather
/// than an empty file.
pub fn export_to_file(
    conn: &Connection,
    export_dir: &Path,
    format: ExportFormat,
    range: ExportRange,
    today: NaiveDate,
) -> Result<ExportOutcome> {
    let bounds = range.resolve(today)?;
    let rows = collect_export_rows(conn, bounds)?;
    if rows.is_empty() {
        return Err(StoreError::Invalid(NO_DATA_MESSAGE.into()).into());
    }

    let body = match format {
        ExportFormat::Csv => render_csv(&rows)?,
        ExportFormat::Json => render_json(&rows)?,
    };

    fs::create_dir_all(export_dir)
        .with_context(|| format!("failed to create {}", export_dir.display()))?;
    let path = export_dir.join(export_file_name(format, today));
    fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), rows = rows.len(), format = format.label(), "exported ratings");
    Ok(ExportOutcome {
        path,
        rows: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        add_category, add_member, delete_category, fetch_active_categories, fetch_self,
        open_in_memory, save_rating,
    };
    use crate::models::{RatingValue, RelationshipType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded() -> Connection {
        let conn = open_in_memory().expect("db");
        let me = fetch_self(&conn).unwrap().unwrap();
        let overall = fetch_active_categories(&conn).unwrap().remove(0);
        save_rating(&conn, overall.id, me.id, date(2024, 3, 1), RatingValue::Positive).unwrap();
        save_rating(&conn, overall.id, me.id, date(2024, 3, 5), RatingValue::Negative).unwrap();
        conn
    }

    #[test]
    fn csv_has_header_and_newest_first() {
        let conn = seeded();
        let csv = export_csv(&conn, None).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "Date,Family Member,Category,Rating");
        assert_eq!(lines[1], "2024-03-05,Me,Overall Day,Sad");
        assert_eq!(lines[2], "2024-03-01,Me,Overall Day,Happy");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn csv_quotes_names_with_commas() {
        let conn = open_in_memory().expect("db");
        let kid = add_member(&conn, "Ann, Jr", RelationshipType::Child).unwrap();
        let category = add_category(&conn, "Sleep").unwrap();
        save_rating(&conn, category.id, kid.id, date(2024, 1, 1), RatingValue::Neutral).unwrap();

        let csv = export_csv(&conn, None).unwrap();
        assert!(csv.contains("2024-01-01,\"Ann, Jr\",Sleep,Neutral"));
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let conn = seeded();
        let json = export_json(&conn, Some((date(2024, 3, 1), date(2024, 3, 2)))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let ratings = value["ratings"].as_array().unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0]["date"], "2024-03-01");
        assert_eq!(ratings[0]["familyMember"], "Me");
        assert_eq!(ratings[0]["category"], "Overall Day");
        assert_eq!(ratings[0]["rating"], "Happy");
        assert_eq!(ratings[0]["emoji"], "😊");
    }

    #[test]
    fn deleted_categories_keep_their_names() {
        let conn = open_in_memory().expect("db");
        let me = fetch_self(&conn).unwrap().unwrap();
        let sleep = add_category(&conn, "Sleep").unwrap();
        save_rating(&conn, sleep.id, me.id, date(2024, 2, 2), RatingValue::Positive).unwrap();
        delete_category(&conn, sleep.id).unwrap();

        let rows = collect_export_rows(&conn, None).unwrap();
        assert_eq!(rows[0].category, "Sleep");
    }

    #[test]
    fn ranges_resolve_against_today() {
        let today = date(2024, 6, 30);
        assert_eq!(ExportRange::AllTime.resolve(today).unwrap(), None);
        assert_eq!(
            ExportRange::Last30Days.resolve(today).unwrap(),
            Some((date(2024, 5, 31), today))
        );
        let inverted = ExportRange::Custom {
            start: date(2024, 6, 2),
            end: date(2024, 6, 1),
        };
        assert!(matches!(
            inverted.resolve(today),
            Err(StoreError::Invalid(_))
        ));
        assert!(ExportRange::Last90Days.next(today).is_custom());
        assert_eq!(ExportFormat::Csv.toggle(), ExportFormat::Json);
    }

    #[test]
    fn export_writes_dated_file() {
        let conn = seeded();
        let dir = tempfile::tempdir().expect("tempdir");
        let export_dir = dir.path().join("exports");
        let today = date(2024, 3, 10);

        let outcome =
            export_to_file(&conn, &export_dir, ExportFormat::Json, ExportRange::AllTime, today)
                .unwrap();
        assert_eq!(outcome.rows, 2);
        assert_eq!(
            outcome.path,
            export_dir.join("dayrater_export_2024-03-10.json")
        );
        let written = fs::read_to_string(&outcome.path).unwrap();
        assert!(written.contains("\"familyMember\": \"Me\""));
    }

    #[test]
    fn empty_selection_is_refused() {
        let conn = seeded();
        let dir = tempfile::tempdir().expect("tempdir");
        let err = export_to_file(
            &conn,
            dir.path(),
            ExportFormat::Csv,
            ExportRange::Last30Days,
            date(2025, 1, 1),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), NO_DATA_MESSAGE);
        assert!(!dir.path().join("dayrater_export_2025-01-01.csv").exists());
    }
}
