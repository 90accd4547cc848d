pub mod cascade;
pub mod labels;
pub mod links;
pub mod recipes;

use std::ops::Deref;
use std::path::Path;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::{debug, info};

use crate::error::{CatalogError, CatalogResult};
use crate::ids::{RecipeId, TagId};
use crate::query::search::{self, SearchQuery};
use crate::tags::{Tag, TagNode, build_forest};

pub use cascade::TagDeletionReport;
pub use recipes::{Recipe, RecipeInput, RecipeSummary};

pub const SCHEMA_VERSION: i64 = 1;
pub const BUSY_TIMEOUT_DEFAULT: Duration = Duration::from_millis(5000);

pub struct RecipeStore {
    conn: Connection,
}

impl RecipeStore {
    pub fn open(path: &Path, busy_timeout: Duration) -> CatalogResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let store = Self { conn };
        store.init_schema()?;
        debug!(path = %path.display(), "opened recipe store");
        Ok(store)
    }

    pub fn open_in_memory() -> CatalogResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )?;

        let version: i64 = self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        match version {
            0 => {
                self.create_schema_v1()?;
                self.conn
                    .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
            }
            SCHEMA_VERSION => self.create_schema_v1()?,
            _ => return Err(rusqlite::Error::InvalidQuery),
        }
        Ok(())
    }

    fn create_schema_v1(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS recipes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL CHECK (length(title) > 0),
                description TEXT,
                ingredients TEXT NOT NULL,
                instructions TEXT NOT NULL,
                prep_time INTEGER CHECK (prep_time IS NULL OR prep_time > 0),
                cook_time INTEGER CHECK (cook_time IS NULL OR cook_time > 0),
                servings INTEGER CHECK (servings IS NULL OR servings > 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_recipes_created_at ON recipes(created_at);

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE CHECK (length(name) > 0),
                parent_id INTEGER REFERENCES tags(id),
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tags_parent_id ON tags(parent_id);

            CREATE TABLE IF NOT EXISTS recipe_tags (
                recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (recipe_id, tag_id)
            );

            CREATE INDEX IF NOT EXISTS idx_recipe_tags_tag_id ON recipe_tags(tag_id);
            ",
        )?;
        Ok(())
    }

    pub fn list_tags(&self) -> CatalogResult<Vec<TagNode>> {
        let tags = labels::all_tags_on(&self.conn)?;
        Ok(build_forest(&tags))
    }

    pub fn list_tags_flat(&self) -> CatalogResult<Vec<Tag>> {
        labels::all_tags_on(&self.conn)
    }

    pub fn get_tag(&self, id: TagId) -> CatalogResult<Tag> {
        labels::tag_by_id_on(&self.conn, id)?.ok_or(CatalogError::NotFound {
            entity: "tag",
            id: id.get(),
        })
    }

    pub fn create_tag(&self, name: &str, parent_id: Option<TagId>) -> CatalogResult<Tag> {
        let tx = begin_write(&self.conn)?;
        let tag = labels::create_tag_on(tx.deref(), name, parent_id)?;
        tx.commit()?;
        info!(tag_id = %tag.id, name = %tag.name, "created tag");
        Ok(tag)
    }

    pub fn move_tag(&self, id: TagId, new_parent: Option<TagId>) -> CatalogResult<Tag> {
        let tx = begin_write(&self.conn)?;
        let tag = labels::move_tag_on(tx.deref(), id, new_parent)?;
        tx.commit()?;
        info!(tag_id = %id, parent_id = ?new_parent.map(TagId::get), "moved tag");
        Ok(tag)
    }

    pub fn delete_tag(&self, id: TagId) -> CatalogResult<TagDeletionReport> {
        cascade::delete_tag_on(&self.conn, id)
    }

    pub fn tag_usage(&self, id: TagId) -> CatalogResult<Vec<RecipeSummary>> {
        cascade::recipes_for_tag_on(&self.conn, id)
    }

    pub fn create_recipe(&self, input: &RecipeInput) -> CatalogResult<RecipeId> {
        input.validate()?;
        let tx = begin_write(&self.conn)?;
        let now = now_iso8601();
        let id = recipes::insert_recipe_on(tx.deref(), input, &now)?;
        let tag_ids = labels::resolve_tag_ids(tx.deref(), &input.tags)?;
        links::link(tx.deref(), id, &tag_ids)?;
        tx.commit()?;
        info!(recipe_id = %id, tags = tag_ids.len(), "created recipe");
        Ok(id)
    }

    pub fn update_recipe(&self, id: RecipeId, input: &RecipeInput) -> CatalogResult<()> {
        input.validate()?;
        let tx = begin_write(&self.conn)?;
        let now = now_iso8601();
        if !recipes::update_recipe_on(tx.deref(), id, input, &now)? {
            return Err(CatalogError::NotFound {
                entity: "recipe",
                id: id.get(),
            });
        }
        let removed = links::unlink_all(tx.deref(), id)?;
        let tag_ids = labels::resolve_tag_ids(tx.deref(), &input.tags)?;
        links::link(tx.deref(), id, &tag_ids)?;
        tx.commit()?;
        info!(
            recipe_id = %id,
            unlinked = removed,
            linked = tag_ids.len(),
            "updated recipe"
        );
        Ok(())
    }

    pub fn delete_recipe(&self, id: RecipeId) -> CatalogResult<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(CatalogError::NotFound {
                entity: "recipe",
                id: id.get(),
            });
        }
        info!(recipe_id = %id, "deleted recipe");
        Ok(())
    }

    pub fn get_recipe(&self, id: RecipeId) -> CatalogResult<Recipe> {
        recipes::recipe_by_id_on(&self.conn, id)?.ok_or(CatalogError::NotFound {
            entity: "recipe",
            id: id.get(),
        })
    }

    pub fn search(&self, query: &SearchQuery) -> CatalogResult<Vec<Recipe>> {
        search::search_on(&self.conn, query)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Opens a transaction that takes the write lock up front, so a read followed
/// by a write waits on `busy_timeout` instead of failing on a stale snapshot.
pub(crate) fn begin_write(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn tag_exists_on(conn: &Connection, id: TagId) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM tags WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}
