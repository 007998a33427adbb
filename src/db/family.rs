use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use super::categories::{
    ensure_unique_name, fetch_all_categories, insert_category, next_category_order,
};
use super::connection::now_millis;
use crate::error::StoreError;
use crate::models::{Category, FamilyMember, RelationshipType};

const MEMBER_COLUMNS: &str = "id, name, relationship, display_order, is_active, created_at";
/// Name given to the journal owner on first launch.
const SELF_NAME: &str = "Me";

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<FamilyMember> {
    Ok(FamilyMember {
        id: row.get(0)?,
        name: row.get(1)?,
        relationship: row.get(2)?,
        display_order: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_members<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<FamilyMember>> {
    let mut stmt = conn
        .prepare(sql)
        .context("failed to prepare family member query")?;

    let members = stmt
        .query_map(params, member_from_row)
        .context("failed to load family members")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect family members")?;

    Ok(members)
}

fn query_member<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<FamilyMember>> {
    conn.query_row(sql, params, member_from_row)
        .optional()
        .context("failed to load family member")
}

/// Active members in display order. The self member always sorts first.
pub fn fetch_active_members(conn: &Connection) -> Result<Vec<FamilyMember>> {
    query_members(
        conn,
        &format!(
            "SELECT {MEMBER_COLUMNS} FROM family_members
             WHERE is_active = 1 ORDER BY display_order, id"
        ),
        [],
    )
}

/// Every member ever added, including soft-deleted ones.
pub fn fetch_all_members(conn: &Connection) -> Result<Vec<FamilyMember>> {
    query_members(
        conn,
        &format!("SELECT {MEMBER_COLUMNS} FROM family_members ORDER BY display_order, id"),
        [],
    )
}

pub fn fetch_member(conn: &Connection, id: i64) -> Result<Option<FamilyMember>> {
    query_member(
        conn,
        &format!("SELECT {MEMBER_COLUMNS} FROM family_members WHERE id = ?1"),
        params![id],
    )
}

pub fn fetch_self(conn: &Connection) -> Result<Option<FamilyMember>> {
    fetch_first_active(conn, RelationshipType::SelfMember)
}

pub fn fetch_spouse(conn: &Connection) -> Result<Option<FamilyMember>> {
    fetch_first_active(conn, RelationshipType::Spouse)
}

pub fn fetch_children(conn: &Connection) -> Result<Vec<FamilyMember>> {
    query_members(
        conn,
        &format!(
            "SELECT {MEMBER_COLUMNS} FROM family_members
             WHERE relationship = ?1 AND is_active = 1 ORDER BY display_order, id"
        ),
        params![RelationshipType::Child],
    )
}

fn fetch_first_active(
    conn: &Connection,
    relationship: RelationshipType,
) -> Result<Option<FamilyMember>> {
    query_member(
        conn,
        &format!(
            "SELECT {MEMBER_COLUMNS} FROM family_members
             WHERE relationship = ?1 AND is_active = 1 ORDER BY display_order, id LIMIT 1"
        ),
        params![relationship],
    )
}

pub fn has_spouse(conn: &Connection) -> Result<bool> {
    Ok(fetch_spouse(conn)?.is_some())
}

/// Return the active self member, creating it when the table has none.
pub fn ensure_self(conn: &Connection) -> Result<FamilyMember> {
    if let Some(existing) = fetch_self(conn)? {
        return Ok(existing);
    }

    let created_at = now_millis();
    conn.execute(
        "INSERT INTO family_members (name, relationship, display_order, is_active, created_at)
         VALUES (?1, ?2, 0, 1, ?3)",
        params![SELF_NAME, RelationshipType::SelfMember, created_at],
    )
    .context("failed to insert self member")?;

    tracing::info!("created self family member");
    Ok(FamilyMember {
        id: conn.last_insert_rowid(),
        name: SELF_NAME.to_string(),
        relationship: RelationshipType::SelfMember,
        display_order: 0,
        is_active: true,
        created_at,
    })
}

/// Name of the interaction category that follows a spouse or child around.
pub fn interaction_category_name(member_name: &str) -> String {
    format!("Interactions with {member_name}")
}

/// Add a spouse or child. Their interaction category is created in the same
/// transaction so a member is never left without one.
pub fn add_member(
    conn: &Connection,
    name: &str,
    relationship: RelationshipType,
) -> Result<FamilyMember> {
    let name = validate_name(name)?;

    match relationship {
        RelationshipType::SelfMember => {
            if fetch_self(conn)?.is_some() {
                return Err(StoreError::Constraint("A self member already exists".into()).into());
            }
        }
        RelationshipType::Spouse => {
            if has_spouse(conn)? {
                return Err(StoreError::Constraint("You can only have one spouse".into()).into());
            }
        }
        RelationshipType::Child => {}
    }
    if relationship.category_kind().is_some() {
        ensure_unique_name(conn, &interaction_category_name(&name), None)?;
    }

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin family member transaction")?;

    let display_order: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(display_order), 0) + 10 FROM family_members",
            [],
            |row| row.get(0),
        )
        .context("failed to compute member display order")?;
    let created_at = now_millis();

    tx.execute(
        "INSERT INTO family_members (name, relationship, display_order, is_active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![name, relationship, display_order, created_at],
    )
    .context("failed to insert family member")?;
    let id = tx.last_insert_rowid();

    if let Some(kind) = relationship.category_kind() {
        let order = next_category_order(&tx)?;
        insert_category(&tx, &interaction_category_name(&name), kind, Some(id), order)?;
    }

    tx.commit().context("failed to commit family member")?;
    tracing::info!(member_id = id, relationship = relationship.as_str(), "added family member");

    Ok(FamilyMember {
        id,
        name,
        relationship,
        display_order,
        is_active: true,
        created_at,
    })
}

/// Rename a member and, for spouse/child, their interaction category. Both
/// rows change together or not at all.
pub fn rename_member(conn: &Connection, id: i64, name: &str) -> Result<()> {
    let name = validate_name(name)?;
    fetch_member(conn, id)?.ok_or_else(|| StoreError::not_found("Family member", id))?;

    let category_name = interaction_category_name(&name);
    for category in owned_categories(conn, id)?.iter().filter(|c| c.is_active) {
        ensure_unique_name(conn, &category_name, Some(category.id))?;
    }

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin family member transaction")?;

    tx.execute(
        "UPDATE family_members SET name = ?1 WHERE id = ?2",
        params![name, id],
    )
    .context("failed to rename family member")?;
    tx.execute(
        "UPDATE categories SET name = ?1
         WHERE family_member_id = ?2 AND kind IN ('SPOUSE', 'CHILD')",
        params![category_name, id],
    )
    .context("failed to rename member category")?;

    tx.commit().context("failed to commit family member rename")?;
    tracing::debug!(member_id = id, "renamed family member");
    Ok(())
}

/// Soft-delete a member together with the categories they own. Ratings stay
/// in place so history survives a later restore.
pub fn delete_member(conn: &Connection, id: i64) -> Result<()> {
    let member = fetch_member(conn, id)?.ok_or_else(|| StoreError::not_found("Family member", id))?;
    if !member.can_delete() {
        return Err(StoreError::Constraint("The self member cannot be deleted".into()).into());
    }

    set_member_active(conn, id, false)?;
    tracing::info!(member_id = id, "deleted family member");
    Ok(())
}

/// Reactivate a soft-deleted member and their categories.
pub fn restore_member(conn: &Connection, id: i64) -> Result<()> {
    let member = fetch_member(conn, id)?.ok_or_else(|| StoreError::not_found("Family member", id))?;
    if member.is_spouse() {
        if let Some(spouse) = fetch_spouse(conn)? {
            if spouse.id != id {
                return Err(
                    StoreError::Constraint("You can only have one spouse".into()).into(),
                );
            }
        }
    }
    for category in owned_categories(conn, id)? {
        ensure_unique_name(conn, &category.name, Some(category.id))?;
    }

    set_member_active(conn, id, true)?;
    tracing::info!(member_id = id, "restored family member");
    Ok(())
}

/// Interaction categories owned by a member, active or not.
fn owned_categories(conn: &Connection, member_id: i64) -> Result<Vec<Category>> {
    Ok(fetch_all_categories(conn)?
        .into_iter()
        .filter(|c| c.family_member_id == Some(member_id))
        .collect())
}

fn set_member_active(conn: &Connection, id: i64, active: bool) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin family member transaction")?;

    tx.execute(
        "UPDATE family_members SET is_active = ?1 WHERE id = ?2",
        params![active, id],
    )
    .context("failed to update family member")?;
    tx.execute(
        "UPDATE categories SET is_active = ?1 WHERE family_member_id = ?2",
        params![active, id],
    )
    .context("failed to update member categories")?;

    tx.commit().context("failed to commit family member update")
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid("Name cannot be empty".into()).into());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        add_category, fetch_active_categories, fetch_all_members, fetch_category_for_member,
        open_in_memory,
    };
    use crate::models::CategoryKind;

    #[test]
    fn adding_a_child_creates_interaction_category() {
        let conn = open_in_memory().expect("db");
        let child = add_member(&conn, "  Emma ", RelationshipType::Child).expect("add child");
        assert_eq!(child.name, "Emma");
        assert_eq!(child.display_order, 10);

        let category = fetch_category_for_member(&conn, child.id)
            .expect("query")
            .expect("category exists");
        assert_eq!(category.name, "Interactions with Emma");
        assert_eq!(category.kind, CategoryKind::Child);
        assert_eq!(category.family_member_id, Some(child.id));

        let children = fetch_children(&conn).expect("children");
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn second_spouse_is_rejected() {
        let conn = open_in_memory().expect("db");
        add_member(&conn, "Alex", RelationshipType::Spouse).expect("first spouse");

        let err = add_member(&conn, "Sam", RelationshipType::Spouse).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Constraint(_))
        ));
        assert!(has_spouse(&conn).unwrap());
    }

    #[test]
    fn blank_names_are_invalid() {
        let conn = open_in_memory().expect("db");
        let err = add_member(&conn, "   ", RelationshipType::Child).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn self_member_is_unique_and_undeletable() {
        let conn = open_in_memory().expect("db");
        let me = ensure_self(&conn).expect("self");
        assert_eq!(ensure_self(&conn).unwrap().id, me.id);

        assert!(add_member(&conn, "Other me", RelationshipType::SelfMember).is_err());
        let err = delete_member(&conn, me.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn delete_and_restore_toggle_member_and_category() {
        let conn = open_in_memory().expect("db");
        let spouse = add_member(&conn, "Alex", RelationshipType::Spouse).expect("spouse");

        delete_member(&conn, spouse.id).expect("delete");
        assert!(fetch_spouse(&conn).unwrap().is_none());
        assert!(fetch_active_categories(&conn)
            .unwrap()
            .iter()
            .all(|c| c.family_member_id != Some(spouse.id)));
        assert_eq!(fetch_all_members(&conn).unwrap().len(), 2);

        // A new spouse blocks restoring the old one.
        let replacement = add_member(&conn, "Sam", RelationshipType::Spouse).expect("new spouse");
        assert!(restore_member(&conn, spouse.id).is_err());

        delete_member(&conn, replacement.id).expect("delete replacement");
        restore_member(&conn, spouse.id).expect("restore");
        assert_eq!(fetch_spouse(&conn).unwrap().map(|m| m.id), Some(spouse.id));
        assert!(fetch_category_for_member(&conn, spouse.id).unwrap().is_some());
    }

    #[test]
    fn rename_updates_interaction_category() {
        let conn = open_in_memory().expect("db");
        let child = add_member(&conn, "Emma", RelationshipType::Child).expect("child");
        rename_member(&conn, child.id, "Emily").expect("rename");

        let member = fetch_member(&conn, child.id).unwrap().unwrap();
        assert_eq!(member.name, "Emily");
        let category = fetch_category_for_member(&conn, child.id).unwrap().unwrap();
        assert_eq!(category.name, "Interactions with Emily");

        let err = rename_member(&conn, 9_999, "Ghost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound { .. })
        ));
    }

    fn assert_constraint(err: anyhow::Error) {
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Constraint(_))
        ));
    }

    fn active_names(conn: &Connection) -> Vec<String> {
        fetch_active_categories(conn)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    #[test]
    fn adding_a_member_whose_category_name_is_taken_fails() {
        let conn = open_in_memory().expect("db");
        add_category(&conn, "interactions with emma").expect("custom");

        assert_constraint(add_member(&conn, "Emma", RelationshipType::Child).unwrap_err());
        assert!(fetch_children(&conn).unwrap().is_empty());
        assert_eq!(
            active_names(&conn)
                .iter()
                .filter(|n| n.eq_ignore_ascii_case("Interactions with Emma"))
                .count(),
            1
        );
    }

    #[test]
    fn rename_clash_leaves_member_and_category_untouched() {
        let conn = open_in_memory().expect("db");
        let child = add_member(&conn, "Emma", RelationshipType::Child).expect("child");
        add_category(&conn, "Interactions with Max").expect("custom");

        assert_constraint(rename_member(&conn, child.id, "Max").unwrap_err());
        assert_eq!(fetch_member(&conn, child.id).unwrap().unwrap().name, "Emma");
        let category = fetch_category_for_member(&conn, child.id).unwrap().unwrap();
        assert_eq!(category.name, "Interactions with Emma");

        // Keeping the same name only matches the member's own category.
        rename_member(&conn, child.id, "Emma").expect("rename in place");
    }

    #[test]
    fn restore_is_refused_when_category_name_was_reused() {
        let conn = open_in_memory().expect("db");
        let child = add_member(&conn, "Emma", RelationshipType::Child).expect("child");
        delete_member(&conn, child.id).expect("delete");
        add_category(&conn, "Interactions with Emma").expect("name is free again");

        assert_constraint(restore_member(&conn, child.id).unwrap_err());
        assert!(!fetch_member(&conn, child.id).unwrap().unwrap().is_active);
        assert_eq!(
            active_names(&conn)
                .iter()
                .filter(|n| n.as_str() == "Interactions with Emma")
                .count(),
            1
        );
    }

    #[test]
    fn display_order_is_not_reused_after_delete() {
        let conn = open_in_memory().expect("db");
        let first = add_member(&conn, "Emma", RelationshipType::Child).expect("first");
        delete_member(&conn, first.id).expect("delete");
        let second = add_member(&conn, "Max", RelationshipType::Child).expect("second");
        assert!(second.display_order > first.display_order);

        restore_member(&conn, first.id).expect("restore");
        let orders: Vec<i64> = fetch_children(&conn)
            .unwrap()
            .iter()
            .map(|m| m.display_order)
            .collect();
        assert_eq!(orders, vec![first.display_order, second.display_order]);
    }
}
