use std::collections::BTreeSet;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use serde::Deserialize;
use tracing::debug;

use crate::error::CatalogResult;
use crate::store::links;
use crate::store::recipes::{RECIPE_COLUMNS, Recipe, recipe_from_row};

/// Recipe filter. No text and no tags means every recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SearchQuery {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.tags.push(name.into());
        self
    }

    /// Only an absent text skips the filter; whitespace is matched literally.
    fn needle(&self) -> Option<String> {
        self.text.as_deref().map(str::to_lowercase)
    }

    fn required_tags(&self) -> BTreeSet<&str> {
        self.tags.iter().map(String::as_str).collect()
    }
}

/// Case-insensitive substring match over every free-text field.
pub fn matches_text(recipe: &Recipe, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    [
        Some(recipe.title.as_str()),
        recipe.description.as_deref(),
        Some(recipe.ingredients.as_str()),
        Some(recipe.instructions.as_str()),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Recipes carrying every requested tag and matching the text, newest first.
pub(crate) fn search_on(conn: &Connection, query: &SearchQuery) -> CatalogResult<Vec<Recipe>> {
    let required = query.required_tags();
    let mut sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes");
    let mut values: Vec<Value> = Vec::new();

    if !required.is_empty() {
        let placeholders = vec!["?"; required.len()].join(", ");
        sql.push_str(&format!(
            " WHERE id IN (
                SELECT rt.recipe_id
                FROM recipe_tags rt
                JOIN tags t ON t.id = rt.tag_id
                WHERE t.name IN ({placeholders})
                GROUP BY rt.recipe_id
                HAVING COUNT(DISTINCT t.name) = ?
            )"
        ));
        values.extend(required.iter().map(|name| Value::Text((*name).to_string())));
        values.push(Value::Integer(required.len() as i64));
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let candidates = stmt
        .query_map(params_from_iter(values.iter()), recipe_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let needle = query.needle();
    let mut hits = Vec::new();
    for mut recipe in candidates {
        if let Some(needle) = needle.as_deref()
            && !matches_text(&recipe, needle)
        {
            continue;
        }
        recipe.tags = links::tag_names_for_recipe(conn, recipe.id)?;
        hits.push(recipe);
    }
    debug!(
        tags = required.len(),
        text = needle.is_some(),
        hits = hits.len(),
        "searched recipes"
    );
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RecipeId;
    use crate::store::{RecipeInput, RecipeStore};

    fn add(store: &RecipeStore, title: &str, tags: &[&str]) -> RecipeId {
        store
            .create_recipe(
                &RecipeInput::new(title, "ingredients", "instructions")
                    .with_tags(tags.iter().copied()),
            )
            .expect("create recipe")
    }

    fn ids(recipes: &[Recipe]) -> Vec<RecipeId> {
        recipes.iter().map(|recipe| recipe.id).collect()
    }

    #[test]
    fn tag_filter_requires_every_tag() {
        let store = RecipeStore::open_in_memory().expect("in-memory store");
        let abc = add(&store, "ABC", &["A", "B", "C"]);
        let ab = add(&store, "AB", &["A", "B"]);
        add(&store, "A", &["A"]);

        let two = store
            .search(&SearchQuery::default().tag("A").tag("B"))
            .expect("search A,B");
        assert_eq!(ids(&two), vec![ab, abc]);

        let three = store
            .search(&SearchQuery::default().tag("A").tag("B").tag("C"))
            .expect("search A,B,C");
        assert_eq!(ids(&three), vec![abc]);
    }

    #[test]
    fn repeated_requested_tags_count_once() {
        let store = RecipeStore::open_in_memory().expect("in-memory store");
        let a = add(&store, "Only A", &["A"]);
        let hits = store
            .search(&SearchQuery::default().tag("A").tag("A"))
            .expect("search");
        assert_eq!(ids(&hits), vec![a]);
    }

    #[test]
    fn unknown_tag_matches_nothing() {
        let store = RecipeStore::open_in_memory().expect("in-memory store");
        add(&store, "Soup", &["Dinner"]);
        let hits = store
            .search(&SearchQuery::default().tag("Dinner").tag("Nope"))
            .expect("search");
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_query_returns_everything_newest_first_with_tags() {
        let store = RecipeStore::open_in_memory().expect("in-memory store");
        let first = add(&store, "First", &["Z", "Y"]);
        let second = add(&store, "Second", &[]);

        let hits = store.search(&SearchQuery::default()).expect("search");
        assert_eq!(ids(&hits), vec![second, first]);
        assert_eq!(hits[1].tags, vec!["Y".to_string(), "Z".to_string()]);
        assert!(hits[0].tags.is_empty());
    }

    #[test]
    fn text_filter_combines_with_tags() {
        let store = RecipeStore::open_in_memory().expect("in-memory store");
        let soup = store
            .create_recipe(
                &RecipeInput::new("Tomato Soup", "tomatoes", "blend").with_tags(["Dinner"]),
            )
            .expect("soup");
        store
            .create_recipe(&RecipeInput::new("Tomato Salad", "tomatoes", "slice"))
            .expect("salad");

        let hits = store
            .search(&SearchQuery::default().text("TOMATO").tag("Dinner"))
            .expect("search");
        assert_eq!(ids(&hits), vec![soup]);

        let spaced = store
            .search(&SearchQuery::default().text("o so"))
            .expect("spaced text");
        assert_eq!(ids(&spaced), vec![soup]);

        let blank = store
            .search(&SearchQuery::default().text("   "))
            .expect("blank text");
        assert!(blank.is_empty());
    }

    #[test]
    fn leading_space_is_part_of_the_needle() {
        let store = RecipeStore::open_in_memory().expect("in-memory store");
        let pie = add(&store, "Apple pie", &[]);
        add(&store, "Piecrust", &[]);

        let hits = store
            .search(&SearchQuery::default().text(" pie"))
            .expect("search");
        assert_eq!(ids(&hits), vec![pie]);
    }

    #[test]
    fn tag_names_are_matched_exactly() {
        let store = RecipeStore::open_in_memory().expect("in-memory store");
        let padded = add(&store, "Padded", &[" Dinner"]);
        let plain = add(&store, "Plain", &["Dinner"]);

        let hits = store
            .search(&SearchQuery::default().tag(" Dinner"))
            .expect("search padded");
        assert_eq!(ids(&hits), vec![padded]);
        let hits = store
            .search(&SearchQuery::default().tag("Dinner"))
            .expect("search plain");
        assert_eq!(ids(&hits), vec![plain]);
    }

    #[test]
    fn text_matches_any_field_case_insensitively() {
        let recipe = Recipe {
            id: RecipeId::new(1).expect("id"),
            title: "Crème Brûlée".to_string(),
            description: Some("Silky custard".to_string()),
            ingredients: "cream, sugar".to_string(),
            instructions: "Torch the top".to_string(),
            prep_time: None,
            cook_time: None,
            servings: None,
            created_at: String::new(),
            updated_at: String::new(),
            tags: Vec::new(),
        };

        assert!(matches_text(&recipe, "BRÛLÉE"));
        assert!(matches_text(&recipe, "silky"));
        assert!(matches_text(&recipe, "am, su"));
        assert!(matches_text(&recipe, "torch"));
        assert!(!matches_text(&recipe, "chocolate"));
    }
}
