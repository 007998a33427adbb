//! End-to-end checks against a real database file: a family keeps a journal
//! for a week, then looks at insights and exports it.

use chrono::{Days, NaiveDate};
use day_rater::db::{
    add_member, count_rated_days, delete_member, fetch_active_categories,
    fetch_category_for_member, fetch_rated_dates, fetch_ratings_in_range, fetch_self,
    open_database, save_rating,
};
use day_rater::export::{export_to_file, ExportFormat, ExportRange};
use day_rater::insights::{build_weekly_summary, calculate_streaks, has_minimum_data, week_start};
use day_rater::{AppConfig, RatingValue, RelationshipType};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn a_week_of_journaling_feeds_insights_and_export() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig::with_data_dir(dir.path());
    let conn = open_database(&config.db_path()).expect("open database");

    let me = fetch_self(&conn).unwrap().expect("self member seeded");
    let spouse = add_member(&conn, "Robin", RelationshipType::Spouse).unwrap();
    let overall = fetch_active_categories(&conn).unwrap().remove(0);
    let together = fetch_category_for_member(&conn, spouse.id)
        .unwrap()
        .expect("interaction category");

    // Monday 2024-05-06 through Friday 2024-05-10.
    let monday = date(2024, 5, 6);
    let values = [
        RatingValue::Positive,
        RatingValue::Neutral,
        RatingValue::Negative,
        RatingValue::Positive,
        RatingValue::Positive,
    ];
    for (offset, value) in values.iter().enumerate() {
        let day = monday + Days::new(offset as u64);
        save_rating(&conn, overall.id, me.id, day, *value).unwrap();
    }
    save_rating(&conn, together.id, me.id, monday, RatingValue::Positive).unwrap();

    let today = date(2024, 5, 10);
    assert_eq!(count_rated_days(&conn).unwrap(), 5);
    assert!(has_minimum_data(count_rated_days(&conn).unwrap()));

    let dates = fetch_rated_dates(&conn).unwrap();
    assert_eq!(calculate_streaks(&dates, today), (5, 5));

    let start = week_start(today, chrono::Weekday::Mon);
    assert_eq!(start, monday);
    let week = fetch_ratings_in_range(&conn, start, start + Days::new(6)).unwrap();
    let summary = build_weekly_summary(start, &week);
    assert_eq!(summary.days_rated, 5);
    let overall_summary = summary
        .category_summaries
        .iter()
        .find(|s| s.category_id == overall.id)
        .unwrap();
    assert_eq!(overall_summary.counts.count(RatingValue::Positive), 3);
    assert_eq!(overall_summary.dominant_rating(), Some(RatingValue::Positive));

    // Removing the spouse hides them but their history still exports by name.
    delete_member(&conn, spouse.id).unwrap();

    let outcome = export_to_file(
        &conn,
        &config.export_dir(),
        ExportFormat::Csv,
        ExportRange::AllTime,
        today,
    )
    .unwrap();
    assert_eq!(outcome.rows, 6);
    let csv = std::fs::read_to_string(&outcome.path).unwrap();
    assert!(csv.starts_with("Date,Family Member,Category,Rating"));
    assert!(csv.contains("Interactions with Robin"));
    assert!(outcome
        .path
        .ends_with("exports/dayrater_export_2024-05-10.csv"));
}

#[test]
fn reopening_keeps_the_journal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig::with_data_dir(dir.path());
    let day = date(2024, 1, 2);

    {
        let conn = open_database(&config.db_path()).unwrap();
        let me = fetch_self(&conn).unwrap().unwrap();
        let overall = fetch_active_categories(&conn).unwrap().remove(0);
        save_rating(&conn, overall.id, me.id, day, RatingValue::Neutral).unwrap();
    }

    let conn = open_database(&config.db_path()).unwrap();
    assert_eq!(fetch_rated_dates(&conn).unwrap(), vec![day]);
    assert_eq!(fetch_active_categories(&conn).unwrap().len(), 4);
}
