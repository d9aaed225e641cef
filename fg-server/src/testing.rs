//! Fixtures shared by the unit tests.

use fg::basic_models::{IngredientAmount, RecipeForWrite};
use tempfile::TempDir;

use crate::database::Database;
use crate::models::{Ingredient, NewUser, Tag, User};
use crate::recipes::writer;

/// A fresh database in a temporary directory. Keep the directory alive for the test.
pub async fn temp_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::connect(dir.path().join("test.db")).await.unwrap();
    (db, dir)
}

/// Two cooks and a small catalog.
pub struct Kitchen {
    pub alice: i64,
    pub bob: i64,
    pub flour: i64,
    pub sugar: i64,
    pub milk: i64,
    pub lunch: i64,
    pub dinner: i64,
}

impl Kitchen {
    pub fn seed(db: &Database) -> Self {
        Self {
            alice: user(db, "alice"),
            bob: user(db, "bob"),
            flour: Ingredient::push(db, "flour", "g").unwrap(),
            sugar: Ingredient::push(db, "sugar", "g").unwrap(),
            milk: Ingredient::push(db, "milk", "ml").unwrap(),
            lunch: Tag::push(db, "Lunch", "lunch").unwrap(),
            dinner: Tag::push(db, "Dinner", "dinner").unwrap(),
        }
    }
}

pub fn user(db: &Database, username: &str) -> i64 {
    User::push(
        db,
        NewUser {
            email: format!("{username}@example.com"),
            username: username.into(),
            first_name: username.into(),
            last_name: "Cook".into(),
            ..Default::default()
        },
    )
    .unwrap()
}

pub fn payload(name: &str, ingredients: &[(i64, i64)], tags: &[i64]) -> RecipeForWrite {
    RecipeForWrite {
        name: Some(name.into()),
        text: Some(format!("How to make {name}.")),
        cooking_time: Some(30),
        image: Some("recipes/images/dish.png".into()),
        tags: Some(tags.to_vec()),
        ingredients: Some(
            ingredients
                .iter()
                .map(|&(id, amount)| IngredientAmount { id, amount })
                .collect(),
        ),
    }
}

pub fn create_recipe(
    db: &Database,
    author_id: i64,
    name: &str,
    ingredients: &[(i64, i64)],
    tags: &[i64],
) -> i64 {
    writer::create(db, author_id, payload(name, ingredients, tags)).unwrap()
}
