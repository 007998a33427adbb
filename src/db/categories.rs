use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use super::connection::now_millis;
use super::family::fetch_member;
use crate::error::StoreError;
use crate::models::{Category, CategoryKind};

const CATEGORY_COLUMNS: &str =
    "id, name, kind, family_member_id, display_order, is_active, created_at";

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        family_member_id: row.get(3)?,
        display_order: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_categories<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Category>> {
    let mut stmt = conn
        .prepare(sql)
        .context("failed to prepare category query")?;

    let categories = stmt
        .query_map(params, category_from_row)
        .context("failed to load categories")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect categories")?;

    Ok(categories)
}

/// Categories shown on the rating screen, in display order.
pub fn fetch_active_categories(conn: &Connection) -> Result<Vec<Category>> {
    query_categories(
        conn,
        &format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories
             WHERE is_active = 1 ORDER BY display_order, id"
        ),
        [],
    )
}

/// Every category including soft-deleted ones. Used when resolving names for
/// exports so old ratings keep their labels.
pub fn fetch_all_categories(conn: &Connection) -> Result<Vec<Category>> {
    query_categories(
        conn,
        &format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY display_order, id"),
        [],
    )
}

pub fn fetch_category(conn: &Connection, id: i64) -> Result<Option<Category>> {
    conn.query_row(
        &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
        params![id],
        category_from_row,
    )
    .optional()
    .context("failed to load category")
}

/// The active interaction category owned by a spouse or child.
pub fn fetch_category_for_member(conn: &Connection, member_id: i64) -> Result<Option<Category>> {
    conn.query_row(
        &format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories
             WHERE family_member_id = ?1 AND is_active = 1 ORDER BY id LIMIT 1"
        ),
        params![member_id],
        category_from_row,
    )
    .optional()
    .context("failed to load member category")
}

/// Create a user-defined category at the end of the list.
pub fn add_category(conn: &Connection, name: &str) -> Result<Category> {
    let name = validate_name(name)?;
    ensure_unique_name(conn, &name, None)?;

    let order = next_category_order(conn)?;
    let category = insert_category(conn, &name, CategoryKind::Custom, None, order)?;
    tracing::info!(category_id = category.id, "added custom category");
    Ok(category)
}

/// Rename any category. Names stay unique among active categories, ignoring
/// case.
pub fn rename_category(conn: &Connection, id: i64, name: &str) -> Result<()> {
    let name = validate_name(name)?;
    ensure_unique_name(conn, &name, Some(id))?;

    let updated = conn
        .execute(
            "UPDATE categories SET name = ?1 WHERE id = ?2",
            params![name, id],
        )
        .context("failed to rename category")?;

    if updated == 0 {
        Err(StoreError::not_found("Category", id).into())
    } else {
        tracing::debug!(category_id = id, "renamed category");
        Ok(())
    }
}

/// Soft-delete a custom category. Its ratings stay in the table but drop out
/// of every active listing.
pub fn delete_category(conn: &Connection, id: i64) -> Result<()> {
    let category = fetch_category(conn, id)?.ok_or_else(|| StoreError::not_found("Category", id))?;
    if !category.can_delete() {
        return Err(
            StoreError::Constraint("Only custom categories can be deleted".into()).into(),
        );
    }

    conn.execute(
        "UPDATE categories SET is_active = 0 WHERE id = ?1",
        params![id],
    )
    .context("failed to delete category")?;
    tracing::info!(category_id = id, "deleted category");
    Ok(())
}

/// Reactivate a category. A member's interaction category only comes back
/// with its member.
pub fn restore_category(conn: &Connection, id: i64) -> Result<()> {
    let category = fetch_category(conn, id)?.ok_or_else(|| StoreError::not_found("Category", id))?;
    if let Some(member_id) = category.family_member_id {
        let member_active = fetch_member(conn, member_id)?.is_some_and(|m| m.is_active);
        if !member_active {
            return Err(StoreError::Invalid(
                "Restore the family member to bring back their category".into(),
            )
            .into());
        }
    }
    ensure_unique_name(conn, &category.name, Some(id))?;

    conn.execute(
        "UPDATE categories SET is_active = 1 WHERE id = ?1",
        params![id],
    )
    .context("failed to restore category")?;
    tracing::info!(category_id = id, "restored category");
    Ok(())
}

/// Display order for a category appended after every existing one. Deleted
/// rows count too so a later restore cannot tie with a newer category.
pub(crate) fn next_category_order(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(display_order), 0) + 10 FROM categories",
        [],
        |row| row.get(0),
    )
    .context("failed to compute category display order")
}

pub(crate) fn insert_category(
    conn: &Connection,
    name: &str,
    kind: CategoryKind,
    family_member_id: Option<i64>,
    display_order: i64,
) -> Result<Category> {
    let created_at = now_millis();
    conn.execute(
        "INSERT INTO categories (name, kind, family_member_id, display_order, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![name, kind, family_member_id, display_order, created_at],
    )
    .context("failed to insert category")?;

    Ok(Category {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        kind,
        family_member_id,
        display_order,
        is_active: true,
        created_at,
    })
}

pub(crate) fn ensure_unique_name(
    conn: &Connection,
    name: &str,
    exclude: Option<i64>,
) -> Result<()> {
    let clashes: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM categories
             WHERE is_active = 1 AND name = ?1 COLLATE NOCASE AND (?2 IS NULL OR id <> ?2)",
            params![name, exclude],
            |row| row.get(0),
        )
        .context("failed to check category name")?;

    if clashes > 0 {
        Err(StoreError::Constraint("A category with this name already exists".into()).into())
    } else {
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid("Category name cannot be empty".into()).into());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{add_member, delete_member, fetch_active_members, open_in_memory};
    use crate::models::RelationshipType;

    #[test]
    fn custom_category_is_appended() {
        let conn = open_in_memory().expect("db");
        let category = add_category(&conn, "Sleep").expect("add");
        assert_eq!(category.kind, CategoryKind::Custom);
        assert_eq!(category.display_order, 40);

        let names: Vec<_> = fetch_active_categories(&conn)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names.last().map(String::as_str), Some("Sleep"));
    }

    #[test]
    fn duplicate_names_are_rejected_case_insensitively() {
        let conn = open_in_memory().expect("db");
        add_category(&conn, "Sleep").expect("add");
        let err = add_category(&conn, "sleep").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Constraint(_))
        ));

        // Renaming to its own name is fine.
        let sleep = fetch_active_categories(&conn)
            .unwrap()
            .into_iter()
            .find(|c| c.name == "Sleep")
            .unwrap();
        rename_category(&conn, sleep.id, "SLEEP").expect("rename in place");
        assert!(rename_category(&conn, sleep.id, "Overall Day").is_err());
    }

    #[test]
    fn soft_deleted_categories_leave_active_listing() {
        let conn = open_in_memory().expect("db");
        let sleep = add_category(&conn, "Sleep").expect("add");
        delete_category(&conn, sleep.id).expect("delete");

        assert!(fetch_active_categories(&conn)
            .unwrap()
            .iter()
            .all(|c| c.id != sleep.id));
        let stored = fetch_category(&conn, sleep.id).unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(fetch_all_categories(&conn).unwrap().len(), 5);

        restore_category(&conn, sleep.id).expect("restore");
        assert!(fetch_active_categories(&conn)
            .unwrap()
            .iter()
            .any(|c| c.id == sleep.id));
    }

    #[test]
    fn built_in_categories_cannot_be_deleted() {
        let conn = open_in_memory().expect("db");
        let overall = fetch_active_categories(&conn).unwrap().remove(0);
        let err = delete_category(&conn, overall.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Constraint(_))
        ));

        let err = delete_category(&conn, 4_242).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn member_category_stays_hidden_while_member_is_deleted() {
        let conn = open_in_memory().expect("db");
        let child = add_member(&conn, "Emma", RelationshipType::Child).expect("child");
        let category = fetch_category_for_member(&conn, child.id).unwrap().unwrap();
        delete_member(&conn, child.id).expect("delete member");

        let err = restore_category(&conn, category.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Invalid(_))
        ));
        assert!(!fetch_category(&conn, category.id).unwrap().unwrap().is_active);
        assert_eq!(fetch_active_members(&conn).unwrap().len(), 1);
    }

    #[test]
    fn restored_category_keeps_its_place() {
        let conn = open_in_memory().expect("db");
        let sleep = add_category(&conn, "Sleep").expect("sleep");
        delete_category(&conn, sleep.id).expect("delete");
        let reading = add_category(&conn, "Reading").expect("reading");
        assert!(reading.display_order > sleep.display_order);

        restore_category(&conn, sleep.id).expect("restore");
        let tail: Vec<(String, i64)> = fetch_active_categories(&conn)
            .unwrap()
            .into_iter()
            .rev()
            .take(2)
            .map(|c| (c.name, c.display_order))
            .collect();
        assert_eq!(
            tail,
            vec![
                ("Reading".to_string(), reading.display_order),
                ("Sleep".to_string(), sleep.display_order),
            ]
        );
    }
}
