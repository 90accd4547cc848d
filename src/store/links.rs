use rusqlite::{Connection, params};

use crate::ids::{RecipeId, TagId};

/// Links a recipe to each tag. Already-linked pairs are left untouched.
pub(crate) fn link(
    conn: &Connection,
    recipe_id: RecipeId,
    tag_ids: &[TagId],
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)",
    )?;
    let mut inserted = 0;
    for tag_id in tag_ids {
        inserted += stmt.execute(params![recipe_id, tag_id])?;
    }
    Ok(inserted)
}

pub(crate) fn unlink_all(conn: &Connection, recipe_id: RecipeId) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM recipe_tags WHERE recipe_id = ?1",
        params![recipe_id],
    )
}

pub(crate) fn tag_names_for_recipe(
    conn: &Connection,
    recipe_id: RecipeId,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name
         FROM recipe_tags rt
         JOIN tags t ON t.id = rt.tag_id
         WHERE rt.recipe_id = ?1
         ORDER BY t.name ASC",
    )?;
    let names = stmt
        .query_map(params![recipe_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}
