use std::ops::Deref;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CatalogResult;
use crate::ids::TagId;
use crate::store::begin_write;
use crate::store::recipes::{RecipeSummary, summary_from_row};
use crate::tags::TagRef;

/// What a tag deletion touched, as observed inside the deleting transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDeletionReport {
    pub tag_id: TagId,
    pub new_parent_id: Option<TagId>,
    pub affected_count: usize,
    pub affected_recipes: Vec<RecipeSummary>,
    pub promoted_count: usize,
    pub promoted_children: Vec<TagRef>,
}

impl TagDeletionReport {
    pub fn is_noop(&self) -> bool {
        self.affected_recipes.is_empty() && self.promoted_children.is_empty()
    }
}

pub(crate) fn recipes_for_tag_on(
    conn: &Connection,
    id: TagId,
) -> CatalogResult<Vec<RecipeSummary>> {
    let mut stmt = conn.prepare_cached(
        "SELECT r.id, r.title, r.description
         FROM recipes r
         JOIN recipe_tags rt ON rt.recipe_id = r.id
         WHERE rt.tag_id = ?1
         ORDER BY r.created_at DESC, r.id DESC",
    )?;
    let recipes = stmt
        .query_map(params![id], summary_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(recipes)
}

fn children_of_on(conn: &Connection, id: TagId) -> rusqlite::Result<Vec<TagRef>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name FROM tags WHERE parent_id = ?1 ORDER BY name ASC, id ASC",
    )?;
    let children = stmt
        .query_map(params![id], |row| {
            Ok(TagRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(children)
}

/// Deletes a tag, promoting its children to the tag's own parent.
///
/// Runs as one immediate transaction: impact is collected, children are re-parented,
/// then the tag row is removed and the `recipe_tags` cascade drops its links.
/// Children must move first, otherwise the foreign key on `parent_id` rejects
/// the delete. A missing id commits an empty report.
pub(crate) fn delete_tag_on(conn: &Connection, id: TagId) -> CatalogResult<TagDeletionReport> {
    let tx = begin_write(conn)?;

    let affected_recipes = recipes_for_tag_on(tx.deref(), id)?;
    let promoted_children = children_of_on(tx.deref(), id)?;
    debug!(
        tag_id = %id,
        recipes = affected_recipes.len(),
        children = promoted_children.len(),
        "collected tag deletion impact"
    );

    let new_parent_id: Option<TagId> = tx
        .query_row(
            "SELECT parent_id FROM tags WHERE id = ?1",
            params![id],
            |row| row.get::<_, Option<TagId>>(0),
        )
        .optional()?
        .flatten();

    let promoted = tx.execute(
        "UPDATE tags SET parent_id = ?1 WHERE parent_id = ?2",
        params![new_parent_id, id],
    )?;
    debug!(
        tag_id = %id,
        promoted,
        new_parent = ?new_parent_id.map(TagId::get),
        "promoted children"
    );

    let deleted = tx.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
    tx.commit()?;

    let report = TagDeletionReport {
        tag_id: id,
        new_parent_id,
        affected_count: affected_recipes.len(),
        affected_recipes,
        promoted_count: promoted_children.len(),
        promoted_children,
    };
    if deleted == 0 {
        debug!(tag_id = %id, "tag did not exist, nothing deleted");
    } else {
        info!(
            tag_id = %id,
            affected = report.affected_count,
            promoted = report.promoted_count,
            "deleted tag"
        );
    }
    Ok(report)
}
