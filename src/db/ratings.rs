use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Error as SqlError, ErrorCode, OptionalExtension, Params, Row};

use super::connection::now_millis;
use super::family::{fetch_active_members, fetch_member};
use crate::calendar::month_bounds;
use crate::error::StoreError;
use crate::insights::RatingDistribution;
use crate::models::{
    DailyRating, DatedRating, DayRatings, Rating, RatingValue, RatingWithCategory,
};

const RATING_COLUMNS: &str = "id, date, family_member_id, category_id, rating_value, updated_at";

fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<DailyRating> {
    Ok(DailyRating {
        id: row.get(0)?,
        date: row.get(1)?,
        family_member_id: row.get(2)?,
        category_id: row.get(3)?,
        value: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn dated_from_row(row: &Row<'_>) -> rusqlite::Result<DatedRating> {
    Ok(DatedRating {
        date: row.get(0)?,
        value: row.get(1)?,
    })
}

fn with_category_from_row(row: &Row<'_>) -> rusqlite::Result<RatingWithCategory> {
    Ok(RatingWithCategory {
        id: row.get(0)?,
        date: row.get(1)?,
        family_member_id: row.get(2)?,
        category_id: row.get(3)?,
        category_name: row.get(4)?,
        value: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Run a query and collect every mapped row, attaching `what` to failures.
fn collect_rows<T, P, F>(conn: &Connection, sql: &str, params: P, what: &str, map: F) -> Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("failed to prepare {what} query"))?;

    let rows = stmt
        .query_map(params, map)
        .with_context(|| format!("failed to load {what}"))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to collect {what}"))?;

    Ok(rows)
}

/// Upsert the rating for one (date, member, category) triple. A second call
/// for the same triple replaces the value and refreshes `updated_at`.
pub fn save_rating(
    conn: &Connection,
    category_id: i64,
    member_id: i64,
    date: NaiveDate,
    value: RatingValue,
) -> Result<()> {
    conn.execute(
        "INSERT INTO daily_ratings (date, family_member_id, category_id, rating_value, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(date, family_member_id, category_id)
         DO UPDATE SET rating_value = excluded.rating_value, updated_at = excluded.updated_at",
        params![date, member_id, category_id, value, now_millis()],
    )
    .map_err(map_reference_violation)
    .context("failed to save rating")?;

    tracing::debug!(%date, member_id, category_id, rating = value.as_str(), "saved rating");
    Ok(())
}

/// Clear a rating. Surfaces `NotFound` when nothing was stored.
pub fn delete_rating(
    conn: &Connection,
    category_id: i64,
    member_id: i64,
    date: NaiveDate,
) -> Result<()> {
    let deleted = conn
        .execute(
            "DELETE FROM daily_ratings
             WHERE family_member_id = ?1 AND category_id = ?2 AND date = ?3",
            params![member_id, category_id, date],
        )
        .context("failed to delete rating")?;

    if deleted == 0 {
        Err(StoreError::not_found("Rating for category", category_id).into())
    } else {
        tracing::debug!(%date, member_id, category_id, "cleared rating");
        Ok(())
    }
}

pub fn fetch_rating(
    conn: &Connection,
    date: NaiveDate,
    member_id: i64,
    category_id: i64,
) -> Result<Option<DailyRating>> {
    conn.query_row(
        &format!(
            "SELECT {RATING_COLUMNS} FROM daily_ratings
             WHERE date = ?1 AND family_member_id = ?2 AND category_id = ?3"
        ),
        params![date, member_id, category_id],
        rating_from_row,
    )
    .optional()
    .context("failed to load rating")
}

fn member_ratings(conn: &Connection, date: NaiveDate, member_id: i64) -> Result<Vec<Rating>> {
    collect_rows(
        conn,
        "SELECT dr.category_id, c.name, dr.rating_value
         FROM daily_ratings dr
         INNER JOIN categories c ON c.id = dr.category_id
         WHERE dr.date = ?1 AND dr.family_member_id = ?2 AND c.is_active = 1
         ORDER BY c.display_order, c.id",
        params![date, member_id],
        "day ratings",
        |row| {
            Ok(Rating {
                category_id: row.get(0)?,
                category_name: row.get(1)?,
                value: row.get(2)?,
            })
        },
    )
}

/// Ratings a single member gave on `date`, limited to active categories.
/// Returns `None` for an unknown member.
pub fn fetch_day_ratings(
    conn: &Connection,
    date: NaiveDate,
    member_id: i64,
) -> Result<Option<DayRatings>> {
    let Some(member) = fetch_member(conn, member_id)? else {
        return Ok(None);
    };

    let ratings = member_ratings(conn, date, member_id)?;
    Ok(Some(DayRatings {
        date,
        member,
        ratings,
    }))
}

/// One entry per active member, in display order, even if they have no
/// ratings on that day.
pub fn fetch_all_day_ratings(conn: &Connection, date: NaiveDate) -> Result<Vec<DayRatings>> {
    fetch_active_members(conn)?
        .into_iter()
        .map(|member| -> Result<DayRatings> {
            let ratings = member_ratings(conn, date, member.id)?;
            Ok(DayRatings {
                date,
                member,
                ratings,
            })
        })
        .collect()
}

/// Distinct dates with at least one rating, newest first.
pub fn fetch_rated_dates(conn: &Connection) -> Result<Vec<NaiveDate>> {
    collect_rows(
        conn,
        "SELECT DISTINCT date FROM daily_ratings ORDER BY date DESC",
        [],
        "rated dates",
        |row| row.get(0),
    )
}

/// Distinct rated dates within one calendar month, oldest first.
pub fn fetch_rated_dates_in_month(conn: &Connection, year: i32, month: u32) -> Result<Vec<NaiveDate>> {
    let (start, end) = month_bounds(year, month)?;
    collect_rows(
        conn,
        "SELECT DISTINCT date FROM daily_ratings WHERE date >= ?1 AND date <= ?2 ORDER BY date",
        params![start, end],
        "monthly rated dates",
        |row| row.get(0),
    )
}

/// Ratings between two dates (inclusive) joined with their category name.
/// Ordered by date, then by the category's display order.
pub fn fetch_ratings_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<RatingWithCategory>> {
    collect_rows(
        conn,
        "SELECT dr.id, dr.date, dr.family_member_id, dr.category_id, c.name, dr.rating_value, dr.updated_at
         FROM daily_ratings dr
         LEFT JOIN categories c ON dr.category_id = c.id
         WHERE dr.date BETWEEN ?1 AND ?2
         ORDER BY dr.date ASC, c.display_order ASC, dr.family_member_id ASC",
        params![start, end],
        "ratings in range",
        with_category_from_row,
    )
}

/// Every rating on or before `end`, joined like [`fetch_ratings_in_range`].
pub fn fetch_ratings_through(conn: &Connection, end: NaiveDate) -> Result<Vec<RatingWithCategory>> {
    collect_rows(
        conn,
        "SELECT dr.id, dr.date, dr.family_member_id, dr.category_id, c.name, dr.rating_value, dr.updated_at
         FROM daily_ratings dr
         LEFT JOIN categories c ON dr.category_id = c.id
         WHERE dr.date <= ?1
         ORDER BY dr.date ASC, c.display_order ASC, dr.family_member_id ASC",
        params![end],
        "rating history",
        with_category_from_row,
    )
}

/// Full history for one category, oldest first. Feeds the trend charts.
pub fn fetch_category_history(conn: &Connection, category_id: i64) -> Result<Vec<DatedRating>> {
    collect_rows(
        conn,
        "SELECT date, rating_value FROM daily_ratings
         WHERE category_id = ?1
         ORDER BY date ASC, family_member_id ASC",
        params![category_id],
        "category history",
        dated_from_row,
    )
}

/// "Overall Day" ratings for the heat map. The category is the first built-in
/// one by display order, so renaming it keeps the heat map working.
pub fn fetch_overall_ratings_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DatedRating>> {
    collect_rows(
        conn,
        "SELECT dr.date, dr.rating_value
         FROM daily_ratings dr
         INNER JOIN family_members m ON m.id = dr.family_member_id
         WHERE dr.category_id = (
             SELECT id FROM categories WHERE kind = 'DEFAULT' ORDER BY display_order, id LIMIT 1
         )
         AND dr.date BETWEEN ?1 AND ?2
         ORDER BY dr.date ASC, m.display_order ASC, m.id ASC",
        params![start, end],
        "overall ratings",
        dated_from_row,
    )
}

/// How many ratings of each value exist across the whole journal.
pub fn fetch_rating_distribution(conn: &Connection) -> Result<RatingDistribution> {
    let counts = collect_rows(
        conn,
        "SELECT rating_value, COUNT(*) FROM daily_ratings GROUP BY rating_value",
        [],
        "rating distribution",
        |row| Ok((row.get::<_, RatingValue>(0)?, row.get::<_, i64>(1)?)),
    )?;

    let mut distribution = RatingDistribution::default();
    for (value, count) in counts {
        distribution.add(value, u32::try_from(count).unwrap_or(u32::MAX));
    }
    Ok(distribution)
}

/// Number of distinct dates with at least one rating.
pub fn count_rated_days(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(DISTINCT date) FROM daily_ratings",
        [],
        |row| row.get(0),
    )
    .context("failed to count rated days")
}

/// Raw rows for the exporter: a bounded range when both ends are given,
/// otherwise the whole history. Newest first.
pub fn fetch_ratings_for_export(
    conn: &Connection,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<DailyRating>> {
    match range {
        Some((start, end)) => collect_rows(
            conn,
            &format!(
                "SELECT {RATING_COLUMNS} FROM daily_ratings
                 WHERE date >= ?1 AND date <= ?2
                 ORDER BY date DESC, family_member_id, category_id"
            ),
            params![start, end],
            "export ratings",
            rating_from_row,
        ),
        None => collect_rows(
            conn,
            &format!(
                "SELECT {RATING_COLUMNS} FROM daily_ratings
                 ORDER BY date DESC, family_member_id, category_id"
            ),
            [],
            "export ratings",
            rating_from_row,
        ),
    }
}

/// Foreign key failures mean the caller handed us a member or category id
/// that does not exist.
fn map_reference_violation(err: SqlError) -> anyhow::Error {
    if matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    ) {
        StoreError::Constraint("Unknown family member or category".into()).into()
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        add_category, add_member, delete_category, ensure_self, fetch_active_categories,
        open_in_memory,
    };
    use crate::models::RelationshipType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        conn: Connection,
        me: i64,
        overall: i64,
        activity: i64,
    }

    fn fixture() -> Fixture {
        let conn = open_in_memory().expect("db");
        let me = ensure_self(&conn).expect("self").id;
        let categories = fetch_active_categories(&conn).expect("categories");
        Fixture {
            me,
            overall: categories[0].id,
            activity: categories[1].id,
            conn,
        }
    }

    #[test]
    fn upsert_then_read_returns_latest_value() {
        let f = fixture();
        let day = date(2024, 3, 10);

        save_rating(&f.conn, f.overall, f.me, day, RatingValue::Negative).expect("first save");
        let first = fetch_rating(&f.conn, day, f.me, f.overall).unwrap().unwrap();
        save_rating(&f.conn, f.overall, f.me, day, RatingValue::Positive).expect("second save");

        let stored = fetch_rating(&f.conn, day, f.me, f.overall).unwrap().unwrap();
        assert_eq!(stored.value, RatingValue::Positive);
        assert_eq!(stored.id, first.id);
        assert!(stored.updated_at >= first.updated_at);

        let count: i64 = f
            .conn
            .query_row("SELECT COUNT(*) FROM daily_ratings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn ratings_are_scoped_per_member() {
        let f = fixture();
        let spouse = add_member(&f.conn, "Alex", RelationshipType::Spouse).expect("spouse");
        let day = date(2024, 3, 10);

        save_rating(&f.conn, f.overall, f.me, day, RatingValue::Positive).unwrap();
        save_rating(&f.conn, f.overall, spouse.id, day, RatingValue::Negative).unwrap();

        let mine = fetch_day_ratings(&f.conn, day, f.me).unwrap().unwrap();
        assert_eq!(mine.rated_count(), 1);
        assert_eq!(
            mine.rating_for(f.overall).map(|r| r.value),
            Some(RatingValue::Positive)
        );

        let everyone = fetch_all_day_ratings(&f.conn, day).unwrap();
        assert_eq!(everyone.len(), 2);
        assert_eq!(everyone[0].member.id, f.me);
        assert_eq!(everyone[1].ratings[0].value, RatingValue::Negative);

        assert!(fetch_day_ratings(&f.conn, day, 777).unwrap().is_none());
    }

    #[test]
    fn clearing_a_rating_hard_deletes_it() {
        let f = fixture();
        let day = date(2024, 3, 10);
        save_rating(&f.conn, f.activity, f.me, day, RatingValue::Neutral).unwrap();

        delete_rating(&f.conn, f.activity, f.me, day).expect("delete");
        assert!(fetch_rating(&f.conn, day, f.me, f.activity).unwrap().is_none());

        let err = delete_rating(&f.conn, f.activity, f.me, day).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn unknown_category_is_a_constraint_error() {
        let f = fixture();
        let err = save_rating(&f.conn, 9_999, f.me, date(2024, 1, 1), RatingValue::Neutral)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn deleted_categories_drop_out_of_day_view() {
        let f = fixture();
        let sleep = add_category(&f.conn, "Sleep").unwrap();
        let day = date(2024, 3, 10);
        save_rating(&f.conn, sleep.id, f.me, day, RatingValue::Positive).unwrap();
        delete_category(&f.conn, sleep.id).unwrap();

        let mine = fetch_day_ratings(&f.conn, day, f.me).unwrap().unwrap();
        assert!(!mine.has_ratings());
        // The row itself is still there for history and exports.
        assert_eq!(fetch_ratings_for_export(&f.conn, None).unwrap().len(), 1);
    }

    #[test]
    fn date_queries_order_and_filter() {
        let f = fixture();
        for (day, value) in [
            (date(2024, 2, 28), RatingValue::Neutral),
            (date(2024, 3, 1), RatingValue::Positive),
            (date(2024, 3, 31), RatingValue::Negative),
        ] {
            save_rating(&f.conn, f.overall, f.me, day, value).unwrap();
        }
        save_rating(&f.conn, f.activity, f.me, date(2024, 3, 1), RatingValue::Positive).unwrap();

        assert_eq!(
            fetch_rated_dates(&f.conn).unwrap(),
            vec![date(2024, 3, 31), date(2024, 3, 1), date(2024, 2, 28)]
        );
        assert_eq!(
            fetch_rated_dates_in_month(&f.conn, 2024, 3).unwrap(),
            vec![date(2024, 3, 1), date(2024, 3, 31)]
        );
        assert_eq!(count_rated_days(&f.conn).unwrap(), 3);

        let march = fetch_ratings_in_range(&f.conn, date(2024, 3, 1), date(2024, 3, 31)).unwrap();
        assert_eq!(march.len(), 3);
        assert_eq!(march[0].category_name.as_deref(), Some("Overall Day"));
        assert_eq!(march[1].category_name.as_deref(), Some("Physical Activity"));

        let overall =
            fetch_overall_ratings_in_range(&f.conn, date(2024, 3, 1), date(2024, 3, 31)).unwrap();
        assert_eq!(overall.len(), 2);

        let history = fetch_category_history(&f.conn, f.overall).unwrap();
        assert_eq!(history.first().map(|r| r.date), Some(date(2024, 2, 28)));

        let distribution = fetch_rating_distribution(&f.conn).unwrap();
        assert_eq!(distribution.positive, 2);
        assert_eq!(distribution.neutral, 1);
        assert_eq!(distribution.negative, 1);

        let ranged =
            fetch_ratings_for_export(&f.conn, Some((date(2024, 3, 1), date(2024, 3, 2)))).unwrap();
        assert_eq!(ranged.len(), 2);
        assert_eq!(fetch_ratings_through(&f.conn, date(2024, 3, 1)).unwrap().len(), 3);
    }
}
