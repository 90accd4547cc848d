use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult, is_unique_violation};
use crate::ids::TagId;
use crate::store::{now_iso8601, tag_exists_on};
use crate::tags::Tag;

const TAG_COLUMNS: &str = "id, name, parent_id, created_at";

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn all_tags_on(conn: &Connection) -> CatalogResult<Vec<Tag>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {TAG_COLUMNS} FROM tags ORDER BY name ASC"))?;
    let tags = stmt
        .query_map([], tag_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

pub(crate) fn tag_by_id_on(conn: &Connection, id: TagId) -> CatalogResult<Option<Tag>> {
    let tag = conn
        .query_row(
            &format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = ?1"),
            params![id],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

fn tag_id_by_name_on(conn: &Connection, name: &str) -> rusqlite::Result<Option<TagId>> {
    conn.query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
        row.get(0)
    })
    .optional()
}

/// Names are stored and compared exactly as given; only blank names are refused.
fn checked_name(raw: &str) -> CatalogResult<&str> {
    if raw.trim().is_empty() {
        return Err(CatalogError::MissingField("tag name"));
    }
    Ok(raw)
}

fn insert_tag_on(
    conn: &Connection,
    name: &str,
    parent_id: Option<TagId>,
) -> rusqlite::Result<TagId> {
    conn.execute(
        "INSERT INTO tags (name, parent_id, created_at) VALUES (?1, ?2, ?3)",
        params![name, parent_id, now_iso8601()],
    )?;
    // AUTOINCREMENT rowids start at 1.
    TagId::new(conn.last_insert_rowid()).map_err(|_| rusqlite::Error::InvalidQuery)
}

fn require_tag(conn: &Connection, id: TagId) -> CatalogResult<()> {
    if !tag_exists_on(conn, id)? {
        return Err(CatalogError::NotFound {
            entity: "tag",
            id: id.get(),
        });
    }
    Ok(())
}

/// Direct creation path: a name collision is the caller's mistake and is
/// reported as `DuplicateName` instead of being resolved to the existing tag.
pub(crate) fn create_tag_on(
    conn: &Connection,
    raw_name: &str,
    parent_id: Option<TagId>,
) -> CatalogResult<Tag> {
    let name = checked_name(raw_name)?;
    if let Some(parent) = parent_id {
        require_tag(conn, parent)?;
    }

    let id = match insert_tag_on(conn, name, parent_id) {
        Ok(id) => id,
        Err(err) if is_unique_violation(&err) => {
            return Err(CatalogError::DuplicateName(name.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    tag_by_id_on(conn, id)?.ok_or(CatalogError::NotFound {
        entity: "tag",
        id: id.get(),
    })
}

pub(crate) fn move_tag_on(
    conn: &Connection,
    id: TagId,
    new_parent: Option<TagId>,
) -> CatalogResult<Tag> {
    require_tag(conn, id)?;
    if let Some(parent) = new_parent {
        require_tag(conn, parent)?;
        if would_create_cycle(conn, id, parent)? {
            return Err(CatalogError::InvalidArgument(format!(
                "moving tag {id} under {parent} would create a cycle"
            )));
        }
    }

    conn.execute(
        "UPDATE tags SET parent_id = ?1 WHERE id = ?2",
        params![new_parent, id],
    )?;

    tag_by_id_on(conn, id)?.ok_or(CatalogError::NotFound {
        entity: "tag",
        id: id.get(),
    })
}

/// True when `candidate_parent` is `id` itself or one of its descendants.
fn would_create_cycle(
    conn: &Connection,
    id: TagId,
    candidate_parent: TagId,
) -> rusqlite::Result<bool> {
    let mut seen = HashSet::new();
    let mut cursor = Some(candidate_parent);
    while let Some(current) = cursor {
        if current == id {
            return Ok(true);
        }
        // Stored data may already hold a cycle; stop walking once we revisit.
        if !seen.insert(current) {
            return Ok(false);
        }
        cursor = conn
            .query_row(
                "SELECT parent_id FROM tags WHERE id = ?1",
                params![current],
                |row| row.get::<_, Option<TagId>>(0),
            )
            .optional()?
            .flatten();
    }
    Ok(false)
}

/// Resolves tag names to ids, creating missing tags as roots.
///
/// Input order is kept and repeated names collapse to a single id, so the
/// result can be linked without producing duplicate associations.
pub(crate) fn resolve_tag_ids(
    conn: &Connection,
    names: &[String],
) -> CatalogResult<Vec<TagId>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(names.len());
    for raw in names {
        let name = checked_name(raw)?;
        if !seen.insert(name) {
            continue;
        }
        let id = match tag_id_by_name_on(conn, name)? {
            Some(id) => id,
            None => create_or_reread(conn, name)?,
        };
        ids.push(id);
    }
    Ok(ids)
}

/// Inserts `name` as a root tag. If another writer created it first the
/// uniqueness violation is absorbed and the existing id is read back once.
pub(crate) fn create_or_reread(conn: &Connection, name: &str) -> CatalogResult<TagId> {
    match insert_tag_on(conn, name, None) {
        Ok(id) => {
            debug!(tag_id = %id, name, "created tag on first use");
            Ok(id)
        }
        Err(err) if is_unique_violation(&err) => {
            warn!(name, "tag appeared concurrently, re-reading");
            match tag_id_by_name_on(conn, name)? {
                Some(id) => Ok(id),
                None => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}
