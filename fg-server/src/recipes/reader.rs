use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use itertools::Itertools;
use rusqlite::params;
use serde::Serialize;

use crate::database::Database;
use crate::models::{Recipe, RecipeIngredient, RecipeTag, Tag, User};

/// Who is looking, and which of their favourites, cart entries and
/// subscriptions matter for the representations built in this request.
///
/// The sets are loaded once per request so that flagging a page of recipes
/// costs no extra queries per recipe.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub user_id: Option<i64>,
    favourites: HashSet<i64>,
    cart: HashSet<i64>,
    following: HashSet<i64>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn load(db: &Database, user: Option<&User>) -> Result<Self> {
        let Some(user) = user else {
            return Ok(Self::anonymous());
        };
        Ok(Self {
            user_id: Some(user.user_id),
            favourites: id_set(db, "SELECT recipe_id FROM Favourite WHERE user_id = ?", user.user_id)?,
            cart: id_set(db, "SELECT recipe_id FROM ShoppingCart WHERE user_id = ?", user.user_id)?,
            following: id_set(db, "SELECT author_id FROM Follow WHERE user_id = ?", user.user_id)?,
        })
    }

    pub fn has_favourited(&self, recipe_id: i64) -> bool {
        self.favourites.contains(&recipe_id)
    }

    pub fn has_in_cart(&self, recipe_id: i64) -> bool {
        self.cart.contains(&recipe_id)
    }

    pub fn follows(&self, author_id: i64) -> bool {
        self.following.contains(&author_id)
    }
}

fn id_set(db: &Database, sql: &str, user_id: i64) -> Result<HashSet<i64>> {
    let conn = db.pool.get()?;
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

/// A user as shown to someone else.
#[derive(Debug, Serialize, Clone)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn new(user: User, viewer: &Viewer) -> Self {
        let is_subscribed = viewer.follows(user.user_id);
        Self {
            user,
            is_subscribed,
        }
    }
}

/// Everything about a recipe, as seen by one viewer.
#[derive(Debug, Serialize)]
pub struct FullRecipe {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
}

/// Get all the details about a recipe
pub fn read_one(db: &Database, recipe_id: i64, viewer: &Viewer) -> Result<Option<FullRecipe>> {
    match Recipe::get_by_id(db, recipe_id)? {
        Some(recipe) => Ok(read_many(db, vec![recipe], viewer)?.pop()),
        None => Ok(None),
    }
}

/// Build the full representation of several recipes, keeping their order.
///
/// Ingredient lines, tags and authors are fetched with one query each for the
/// whole batch.
pub fn read_many(db: &Database, recipes: Vec<Recipe>, viewer: &Viewer) -> Result<Vec<FullRecipe>> {
    let recipe_ids = recipes.iter().map(|r| r.recipe_id).collect_vec();
    let mut lines = RecipeIngredient::for_recipes(db, &recipe_ids)?
        .into_iter()
        .into_group_map_by(|line| line.recipe_id);
    let mut tags = RecipeTag::for_recipes(db, &recipe_ids)?
        .into_iter()
        .map(|t| (t.recipe_id, t.tag))
        .into_group_map();
    let author_ids = recipes.iter().map(|r| r.author_id).unique().collect_vec();
    let authors: HashMap<i64, User> = User::get_many(db, &author_ids)?
        .into_iter()
        .map(|u| (u.user_id, u))
        .collect();

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                anyhow!("Recipe {} refers to missing author {}", recipe.recipe_id, recipe.author_id)
            })?;
            Ok(FullRecipe {
                id: recipe.recipe_id,
                tags: tags.remove(&recipe.recipe_id).unwrap_or_default(),
                author: UserProfile::new(author, viewer),
                ingredients: lines.remove(&recipe.recipe_id).unwrap_or_default(),
                is_favorited: viewer.has_favourited(recipe.recipe_id),
                is_in_shopping_cart: viewer.has_in_cart(recipe.recipe_id),
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
            })
        })
        .collect()
}
