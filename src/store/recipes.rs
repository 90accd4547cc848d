use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};
use crate::ids::RecipeId;
use crate::store::links;

pub(crate) const RECIPE_COLUMNS: &str = "id, title, description, ingredients, instructions, \
     prep_time, cook_time, servings, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: String,
    pub instructions: String,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub tags: Vec<String>,
}

/// Recipe fields as listed in tag impact and usage reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeSummary {
    pub id: RecipeId,
    pub title: String,
    pub description: Option<String>,
}

/// Full replacement payload for creating or updating a recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecipeInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ingredients: String,
    pub instructions: String,
    #[serde(default)]
    pub prep_time: Option<i64>,
    #[serde(default)]
    pub cook_time: Option<i64>,
    #[serde(default)]
    pub servings: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RecipeInput {
    pub fn new(
        title: impl Into<String>,
        ingredients: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            ingredients: ingredients.into(),
            instructions: instructions.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> CatalogResult<()> {
        for (field, value) in [
            ("title", &self.title),
            ("ingredients", &self.ingredients),
            ("instructions", &self.instructions),
        ] {
            if value.trim().is_empty() {
                return Err(CatalogError::MissingField(field));
            }
        }
        for (field, value) in [
            ("prep_time", self.prep_time),
            ("cook_time", self.cook_time),
            ("servings", self.servings),
        ] {
            if let Some(value) = value
                && value <= 0
            {
                return Err(CatalogError::InvalidArgument(format!(
                    "{field} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn recipe_from_row(row: &Row<'_>) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        ingredients: row.get(3)?,
        instructions: row.get(4)?,
        prep_time: row.get(5)?,
        cook_time: row.get(6)?,
        servings: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        tags: Vec::new(),
    })
}

pub(crate) fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<RecipeSummary> {
    Ok(RecipeSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
    })
}

pub(crate) fn insert_recipe_on(
    conn: &Connection,
    input: &RecipeInput,
    now: &str,
) -> CatalogResult<RecipeId> {
    conn.execute(
        "INSERT INTO recipes (
            title, description, ingredients, instructions,
            prep_time, cook_time, servings, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            input.title.trim(),
            input.description,
            input.ingredients,
            input.instructions,
            input.prep_time,
            input.cook_time,
            input.servings,
            now
        ],
    )?;
    RecipeId::new(conn.last_insert_rowid())
}

/// Replaces every mutable column. Returns false when no such recipe exists.
pub(crate) fn update_recipe_on(
    conn: &Connection,
    id: RecipeId,
    input: &RecipeInput,
    now: &str,
) -> CatalogResult<bool> {
    let updated = conn.execute(
        "UPDATE recipes SET
            title = ?2, description = ?3, ingredients = ?4, instructions = ?5,
            prep_time = ?6, cook_time = ?7, servings = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            id,
            input.title.trim(),
            input.description,
            input.ingredients,
            input.instructions,
            input.prep_time,
            input.cook_time,
            input.servings,
            now
        ],
    )?;
    Ok(updated > 0)
}

pub(crate) fn recipe_by_id_on(conn: &Connection, id: RecipeId) -> CatalogResult<Option<Recipe>> {
    let recipe = conn
        .query_row(
            &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"),
            params![id],
            recipe_from_row,
        )
        .optional()?;
    match recipe {
        Some(mut recipe) => {
            recipe.tags = links::tag_names_for_recipe(conn, id)?;
            Ok(Some(recipe))
        }
        None => Ok(None),
    }
}
