use std::fmt::Debug;

use crate::database::{placeholders, Database, FromRow};
use anyhow::Result;
use rusqlite::{params, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

/// Upper bound for amounts and cooking times, the range of a signed 16-bit column.
pub const MAX_SMALL_INT: i64 = 32_767;

pub fn sqlite_current_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

/// Read a text column through `FromStr`, reporting a parse failure as a conversion error.
fn parse_column<T>(row: &rusqlite::Row, column: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(column)?;
    text.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            row.as_ref().column_index(column).unwrap_or_default(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

#[derive(
    Debug, EnumString, IntoStaticStr, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct User {
    #[serde(rename = "id")]
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip)]
    pub role: Role,
    pub avatar: Option<String>,
}

impl FromRow for User {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get("user_id")?,
            email: row.get("email")?,
            username: row.get("username")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            role: parse_column(row, "role")?,
            avatar: row.get("avatar")?,
        })
    }
}

/// The fields needed to register a user. Accounts are provisioned outside this
/// server; this exists for seeding and tests.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl User {
    pub fn get_by_id(db: &Database, user_id: i64) -> Result<Option<Self>> {
        Ok(db
            .collect_rows("SELECT * FROM User WHERE user_id = ?", params![user_id])?
            .pop())
    }

    /// List users by id, one page at a time.
    pub fn list_page(db: &Database, offset: i64, limit: i64) -> Result<Vec<Self>> {
        db.collect_rows(
            "SELECT * FROM User ORDER BY user_id LIMIT ? OFFSET ?",
            params![limit, offset],
        )
    }

    pub fn count_all(db: &Database) -> Result<i64> {
        db.count("SELECT COUNT(*) FROM User", [])
    }

    /// Fetch every user in `user_ids`, in no particular order.
    pub fn get_many(db: &Database, user_ids: &[i64]) -> Result<Vec<Self>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }
        db.collect_rows(
            &format!(
                "SELECT * FROM User WHERE user_id IN ({})",
                placeholders(user_ids.len())
            ),
            params_from_iter(user_ids),
        )
    }

    pub fn push(db: &Database, user: NewUser) -> Result<i64> {
        let conn = db.pool.get()?;
        let role: &'static str = user.role.into();
        conn.execute(
            "INSERT INTO User (email, username, first_name, last_name, role)
            VALUES (?, ?, ?, ?, ?)",
            params![
                user.email,
                user.username,
                user.first_name,
                user.last_name,
                role
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tag {
    #[serde(rename = "id")]
    pub tag_id: i64,
    pub name: String,
    pub slug: String,
}

impl FromRow for Tag {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            tag_id: row.get("tag_id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
        })
    }
}

impl Tag {
    /// List all the tags, alphabetically
    pub fn list_all(db: &Database) -> Result<Vec<Tag>> {
        db.collect_rows("SELECT * FROM Tag ORDER BY name, tag_id", params![])
    }

    pub fn get_by_id(db: &Database, tag_id: i64) -> Result<Option<Tag>> {
        Ok(db
            .collect_rows("SELECT * FROM Tag WHERE tag_id = ?", params![tag_id])?
            .pop())
    }

    /// Add a tag to the catalog
    pub fn push(db: &Database, name: &str, slug: &str) -> Result<i64> {
        let conn = db.pool.get()?;
        conn.execute(
            "INSERT INTO Tag (name, slug) VALUES (?, ?)",
            params![name, slug],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// A tag as attached to a particular recipe.
#[derive(Debug, Clone)]
pub struct RecipeTag {
    pub recipe_id: i64,
    pub tag: Tag,
}

impl FromRow for RecipeTag {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            recipe_id: row.get("recipe_id")?,
            tag: Tag::from_row(row)?,
        })
    }
}

impl RecipeTag {
    /// All the tags of all the given recipes
    pub fn for_recipes(db: &Database, recipe_ids: &[i64]) -> Result<Vec<Self>> {
        if recipe_ids.is_empty() {
            return Ok(vec![]);
        }
        db.collect_rows(
            &format!(
                "SELECT RecipeTag.recipe_id, Tag.*
                FROM RecipeTag
                INNER JOIN Tag ON Tag.tag_id = RecipeTag.tag_id
                WHERE RecipeTag.recipe_id IN ({})
                ORDER BY Tag.name, Tag.tag_id",
                placeholders(recipe_ids.len())
            ),
            params_from_iter(recipe_ids),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Ingredient {
    #[serde(rename = "id")]
    pub ingredient_id: i64,
    pub name: String,
    pub measurement_unit: String,
}

impl FromRow for Ingredient {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            ingredient_id: row.get("ingredient_id")?,
            name: row.get("name")?,
            measurement_unit: row.get("measurement_unit")?,
        })
    }
}

impl Ingredient {
    /// Ingredients whose name starts with `prefix`, ignoring case in any script.
    /// An empty prefix lists everything.
    pub fn search(db: &Database, prefix: &str) -> Result<Vec<Ingredient>> {
        let escaped = prefix
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        db.collect_rows(
            "SELECT * FROM Ingredient
            WHERE unicode_lower(name) LIKE ? || '%' ESCAPE '\\'
            ORDER BY name, ingredient_id",
            params![escaped],
        )
    }

    pub fn get_by_id(db: &Database, ingredient_id: i64) -> Result<Option<Ingredient>> {
        Ok(db
            .collect_rows(
                "SELECT * FROM Ingredient WHERE ingredient_id = ?",
                params![ingredient_id],
            )?
            .pop())
    }

    /// Add an ingredient to the catalog
    pub fn push(db: &Database, name: &str, measurement_unit: &str) -> Result<i64> {
        let conn = db.pool.get()?;
        conn.execute(
            "INSERT INTO Ingredient (name, measurement_unit) VALUES (?, ?)",
            params![name, measurement_unit],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// One ingredient line of a recipe, with the catalog details joined in.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RecipeIngredient {
    #[serde(skip)]
    pub recipe_id: i64,
    #[serde(rename = "id")]
    pub ingredient_id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl FromRow for RecipeIngredient {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            recipe_id: row.get("recipe_id")?,
            ingredient_id: row.get("ingredient_id")?,
            name: row.get("name")?,
            measurement_unit: row.get("measurement_unit")?,
            amount: row.get("amount")?,
        })
    }
}

impl RecipeIngredient {
    /// All the ingredient lines of all the given recipes
    pub fn for_recipes(db: &Database, recipe_ids: &[i64]) -> Result<Vec<Self>> {
        if recipe_ids.is_empty() {
            return Ok(vec![]);
        }
        db.collect_rows(
            &format!(
                "SELECT RecipeIngredient.recipe_id, RecipeIngredient.amount, Ingredient.*
                FROM RecipeIngredient
                INNER JOIN Ingredient ON Ingredient.ingredient_id = RecipeIngredient.ingredient_id
                WHERE RecipeIngredient.recipe_id IN ({})
                ORDER BY Ingredient.name, Ingredient.ingredient_id",
                placeholders(recipe_ids.len())
            ),
            params_from_iter(recipe_ids),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub recipe_id: i64,
    pub name: String,
    pub author_id: i64,
    pub text: String,
    pub cooking_time: i64,
    pub image: String,
    pub pub_date: String,
    pub short_code: Option<String>,
}

impl FromRow for Recipe {
    /// Create a new recipe from an sql row, provided by rusqlite, using named columns.
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            recipe_id: row.get("recipe_id")?,
            name: row.get("name")?,
            author_id: row.get("author_id")?,
            text: row.get("text")?,
            cooking_time: row.get("cooking_time")?,
            image: row.get("image")?,
            pub_date: row.get("pub_date")?,
            short_code: row.get("short_code")?,
        })
    }
}

/// Which recipes a listing should include. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author_id: Option<i64>,
    /// Recipes carrying any of these tag slugs
    pub tag_slugs: Vec<String>,
    pub favourited_by: Option<i64>,
    pub in_cart_of: Option<i64>,
}

impl RecipeFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = vec![];
        let mut values = vec![];
        if let Some(author_id) = self.author_id {
            clauses.push("Recipe.author_id = ?".to_string());
            values.push(Value::from(author_id));
        }
        if !self.tag_slugs.is_empty() {
            clauses.push(format!(
                "Recipe.recipe_id IN (
                    SELECT RecipeTag.recipe_id FROM RecipeTag
                    INNER JOIN Tag ON Tag.tag_id = RecipeTag.tag_id
                    WHERE Tag.slug IN ({}))",
                placeholders(self.tag_slugs.len())
            ));
            values.extend(self.tag_slugs.iter().cloned().map(Value::from));
        }
        if let Some(user_id) = self.favourited_by {
            clauses.push(
                "Recipe.recipe_id IN (SELECT recipe_id FROM Favourite WHERE user_id = ?)"
                    .to_string(),
            );
            values.push(Value::from(user_id));
        }
        if let Some(user_id) = self.in_cart_of {
            clauses.push(
                "Recipe.recipe_id IN (SELECT recipe_id FROM ShoppingCart WHERE user_id = ?)"
                    .to_string(),
            );
            values.push(Value::from(user_id));
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

impl Recipe {
    /// Get a recipe by ID
    pub fn get_by_id(db: &Database, recipe_id: i64) -> Result<Option<Self>> {
        Ok(db
            .collect_rows(
                "SELECT * FROM Recipe WHERE recipe_id = ?",
                params![recipe_id],
            )?
            .pop())
    }

    /// Find the recipe a short link points at
    pub fn get_by_short_code(db: &Database, short_code: &str) -> Result<Option<Self>> {
        Ok(db
            .collect_rows(
                "SELECT * FROM Recipe WHERE short_code = ?",
                params![short_code],
            )?
            .pop())
    }

    /// One page of recipes matching `filter`, newest first, and the total number of matches.
    pub fn list_page(
        db: &Database,
        filter: &RecipeFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Self>, i64)> {
        let (where_clause, values) = filter.where_clause();
        let total = db.count(
            &format!("SELECT COUNT(*) FROM Recipe {}", where_clause),
            params_from_iter(values.iter()),
        )?;
        let paging = [Value::from(limit), Value::from(offset)];
        let rows = db.collect_rows(
            &format!(
                "SELECT * FROM Recipe {}
                ORDER BY pub_date DESC, recipe_id DESC
                LIMIT ? OFFSET ?",
                where_clause
            ),
            params_from_iter(values.iter().chain(paging.iter())),
        )?;
        Ok((rows, total))
    }

    /// The newest recipes of an author, at most `limit` of them when given.
    pub fn list_by_author(db: &Database, author_id: i64, limit: Option<i64>) -> Result<Vec<Self>> {
        db.collect_rows(
            "SELECT * FROM Recipe WHERE author_id = ?
            ORDER BY pub_date DESC, recipe_id DESC
            LIMIT ?",
            // SQLite treats a negative LIMIT as no limit at all
            params![author_id, limit.unwrap_or(-1)],
        )
    }

    pub fn count_by_author(db: &Database, author_id: i64) -> Result<i64> {
        db.count(
            "SELECT COUNT(*) FROM Recipe WHERE author_id = ?",
            params![author_id],
        )
    }

    /// Delete a recipe; its ingredient lines, tags, favourites and cart entries go with it.
    pub fn delete(db: &Database, recipe_id: i64) -> Result<bool> {
        let conn = db.pool.get()?;
        let removed = conn.execute("DELETE FROM Recipe WHERE recipe_id = ?", params![recipe_id])?;
        tracing::info!(recipe_id, removed, "Deleted recipe");
        Ok(removed > 0)
    }

    /// Whether `user` may change or delete this recipe.
    pub fn editable_by(&self, user: &User) -> bool {
        self.author_id == user.user_id || user.is_admin()
    }
}

/// The short form of a recipe used inside favourites, carts and subscriptions.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RecipeSummary {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.recipe_id,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn user_role_round_trips_through_storage() {
        let (db, _dir) = testing::temp_db().await;
        let admin_id = User::push(
            &db,
            NewUser {
                email: "root@example.com".into(),
                username: "root".into(),
                role: Role::Admin,
                ..Default::default()
            },
        )
        .unwrap();
        let admin = User::get_by_id(&db, admin_id).unwrap().unwrap();
        assert!(admin.is_admin());
        assert_eq!(admin.username, "root");
    }

    #[tokio::test]
    async fn ingredient_search_is_a_case_insensitive_prefix_match() {
        let (db, _dir) = testing::temp_db().await;
        Ingredient::push(&db, "Sugar", "g").unwrap();
        Ingredient::push(&db, "sugar syrup", "ml").unwrap();
        Ingredient::push(&db, "Brown sugar", "g").unwrap();
        Ingredient::push(&db, "50%_cream", "ml").unwrap();

        let found = Ingredient::search(&db, "SUG").unwrap();
        let names: Vec<_> = found.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Sugar", "sugar syrup"]);

        // LIKE wildcards in the query are literal
        assert_eq!(Ingredient::search(&db, "5_%").unwrap().len(), 0);
        assert_eq!(Ingredient::search(&db, "50%_").unwrap().len(), 1);
        assert_eq!(Ingredient::search(&db, "").unwrap().len(), 4);
    }

    #[tokio::test]
    async fn ingredient_search_folds_case_beyond_ascii() {
        let (db, _dir) = testing::temp_db().await;
        let sugar = Ingredient::push(&db, "Сахар", "г").unwrap();
        Ingredient::push(&db, "сахарная пудра", "г").unwrap();
        Ingredient::push(&db, "Соль", "г").unwrap();
        Ingredient::push(&db, "Äpfel", "kg").unwrap();

        let names = |prefix: &str| -> Vec<String> {
            Ingredient::search(&db, prefix)
                .unwrap()
                .into_iter()
                .map(|i| i.name)
                .collect()
        };
        assert_eq!(names("сах"), ["Сахар", "сахарная пудра"]);
        assert_eq!(names("САХАР П"), ["сахарная пудра"]);
        assert_eq!(names("äp"), ["Äpfel"]);
        assert_eq!(Ingredient::search(&db, "Сах").unwrap()[0].ingredient_id, sugar);
    }

    #[tokio::test]
    async fn listing_filters_by_tag_and_author() {
        let (db, _dir) = testing::temp_db().await;
        let kitchen = testing::Kitchen::seed(&db);
        let soup = testing::create_recipe(&db, kitchen.alice, "Soup", &[(kitchen.flour, 1)], &[kitchen.lunch]);
        let cake = testing::create_recipe(&db, kitchen.bob, "Cake", &[(kitchen.flour, 2)], &[kitchen.dinner]);

        let by_tag = RecipeFilter {
            tag_slugs: vec!["lunch".into()],
            ..Default::default()
        };
        let (rows, total) = Recipe::list_page(&db, &by_tag, 0, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].recipe_id, soup);

        let any_tag = RecipeFilter {
            tag_slugs: vec!["lunch".into(), "dinner".into()],
            ..Default::default()
        };
        let (rows, total) = Recipe::list_page(&db, &any_tag, 0, 10).unwrap();
        assert_eq!(total, 2);
        // newest first
        assert_eq!(rows[0].recipe_id, cake);

        let by_author = RecipeFilter {
            author_id: Some(kitchen.bob),
            ..Default::default()
        };
        let (rows, _) = Recipe::list_page(&db, &by_author, 0, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recipe_id, cake);

        let (rows, total) = Recipe::list_page(&db, &RecipeFilter::default(), 1, 1).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].recipe_id, soup);
    }

    #[tokio::test]
    async fn deleting_a_recipe_cascades_to_its_lines() {
        let (db, _dir) = testing::temp_db().await;
        let kitchen = testing::Kitchen::seed(&db);
        let soup = testing::create_recipe(&db, kitchen.alice, "Soup", &[(kitchen.flour, 1)], &[kitchen.lunch]);

        assert!(Recipe::delete(&db, soup).unwrap());
        assert!(!Recipe::delete(&db, soup).unwrap());
        assert!(RecipeIngredient::for_recipes(&db, &[soup]).unwrap().is_empty());
        assert!(RecipeTag::for_recipes(&db, &[soup]).unwrap().is_empty());
    }
}
