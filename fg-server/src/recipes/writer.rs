use fg::basic_models::RecipeForWrite;
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};

use super::validation::{validate_create, validate_update, Components, RecipeError};
use crate::database::{is_unique_violation, Database};
use crate::models::sqlite_current_timestamp;

/// Create a recipe with its ingredient lines and tags, all or nothing.
pub fn create(db: &Database, author_id: i64, payload: RecipeForWrite) -> Result<i64, RecipeError> {
    let recipe = validate_create(payload)?;
    let mut conn = db.pool.get()?;
    let tx = write_transaction(&mut conn)?;
    ensure_name_is_free(&tx, &recipe.name, author_id, None)?;
    ensure_catalog_entries(&tx, &recipe.components)?;
    tx.execute(
        "INSERT INTO Recipe (name, author_id, text, cooking_time, image, pub_date)
        VALUES (?, ?, ?, ?, ?, ?)",
        params![
            recipe.name,
            author_id,
            recipe.text,
            recipe.cooking_time,
            recipe.image,
            sqlite_current_timestamp()
        ],
    )
    .map_err(duplicate_recipe)?;
    let recipe_id = tx.last_insert_rowid();
    replace_components(&tx, recipe_id, &recipe.components)?;
    tx.commit()?;
    tracing::info!(recipe_id, author_id, "Created recipe");
    Ok(recipe_id)
}

/// Update a recipe. Fields left out keep their values, but the ingredient
/// lines and tags are always replaced wholesale. The publication date is kept.
pub fn update(db: &Database, recipe_id: i64, payload: RecipeForWrite) -> Result<(), RecipeError> {
    let changes = validate_update(payload)?;
    let mut conn = db.pool.get()?;
    let tx = write_transaction(&mut conn)?;
    let author_id: i64 = tx
        .query_row(
            "SELECT author_id FROM Recipe WHERE recipe_id = ?",
            params![recipe_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(RecipeError::RecipeNotFound)?;
    if let Some(name) = &changes.name {
        ensure_name_is_free(&tx, name, author_id, Some(recipe_id))?;
    }
    ensure_catalog_entries(&tx, &changes.components)?;
    tx.execute(
        "UPDATE Recipe SET
            name = COALESCE(?, name),
            text = COALESCE(?, text),
            cooking_time = COALESCE(?, cooking_time),
            image = COALESCE(?, image)
        WHERE recipe_id = ?",
        params![
            changes.name,
            changes.text,
            changes.cooking_time,
            changes.image,
            recipe_id
        ],
    )
    .map_err(duplicate_recipe)?;
    replace_components(&tx, recipe_id, &changes.components)?;
    tx.commit()?;
    tracing::info!(recipe_id, "Updated recipe");
    Ok(())
}

/// Take the write lock up front. A deferred transaction that reads first and
/// writes later gets SQLITE_BUSY without waiting when another writer is active.
fn write_transaction(conn: &mut rusqlite::Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

fn duplicate_recipe(err: rusqlite::Error) -> RecipeError {
    if is_unique_violation(&err) {
        RecipeError::DuplicateRecipe
    } else {
        err.into()
    }
}

/// An author may not have two recipes with the same name.
fn ensure_name_is_free(
    tx: &Transaction,
    name: &str,
    author_id: i64,
    except_recipe_id: Option<i64>,
) -> Result<(), RecipeError> {
    let taken: bool = tx.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM Recipe
            WHERE name = ? AND author_id = ? AND recipe_id IS NOT ?)",
        params![name, author_id, except_recipe_id],
        |row| row.get(0),
    )?;
    if taken {
        Err(RecipeError::DuplicateRecipe)
    } else {
        Ok(())
    }
}

/// Every referenced ingredient and tag must exist in the catalog.
fn ensure_catalog_entries(tx: &Transaction, components: &Components) -> Result<(), RecipeError> {
    let mut ingredient_exists =
        tx.prepare_cached("SELECT EXISTS(SELECT 1 FROM Ingredient WHERE ingredient_id = ?)")?;
    for &(ingredient_id, _) in &components.ingredients {
        if !ingredient_exists.query_row(params![ingredient_id], |row| row.get::<_, bool>(0))? {
            return Err(RecipeError::UnknownIngredient(ingredient_id));
        }
    }
    let mut tag_exists = tx.prepare_cached("SELECT EXISTS(SELECT 1 FROM Tag WHERE tag_id = ?)")?;
    for &tag_id in &components.tags {
        if !tag_exists.query_row(params![tag_id], |row| row.get::<_, bool>(0))? {
            return Err(RecipeError::UnknownTag(tag_id));
        }
    }
    Ok(())
}

/// Clear the recipe's ingredient lines and tags and insert the given ones.
fn replace_components(
    tx: &Transaction,
    recipe_id: i64,
    components: &Components,
) -> Result<(), RecipeError> {
    tx.execute(
        "DELETE FROM RecipeIngredient WHERE recipe_id = ?",
        params![recipe_id],
    )?;
    tx.execute("DELETE FROM RecipeTag WHERE recipe_id = ?", params![recipe_id])?;

    let mut insert_line = tx.prepare_cached(
        "INSERT INTO RecipeIngredient (recipe_id, ingredient_id, amount) VALUES (?, ?, ?)",
    )?;
    for &(ingredient_id, amount) in &components.ingredients {
        insert_line
            .execute(params![recipe_id, ingredient_id, amount])
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RecipeError::DuplicateIngredient(ingredient_id)
                } else {
                    e.into()
                }
            })?;
    }
    let mut insert_tag =
        tx.prepare_cached("INSERT INTO RecipeTag (recipe_id, tag_id) VALUES (?, ?)")?;
    for &tag_id in &components.tags {
        insert_tag
            .execute(params![recipe_id, tag_id])
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RecipeError::DuplicateTag(tag_id)
                } else {
                    e.into()
                }
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Recipe, RecipeIngredient, RecipeTag};
    use crate::testing::{self, payload, Kitchen};

    fn lines(db: &Database, recipe_id: i64) -> Vec<(i64, i64)> {
        let mut lines: Vec<_> = RecipeIngredient::for_recipes(db, &[recipe_id])
            .unwrap()
            .into_iter()
            .map(|line| (line.ingredient_id, line.amount))
            .collect();
        lines.sort();
        lines
    }

    fn tags(db: &Database, recipe_id: i64) -> Vec<i64> {
        let mut tags: Vec<_> = RecipeTag::for_recipes(db, &[recipe_id])
            .unwrap()
            .into_iter()
            .map(|t| t.tag.tag_id)
            .collect();
        tags.sort();
        tags
    }

    #[tokio::test]
    async fn create_stores_lines_and_tags() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let recipe_id = create(
            &db,
            k.alice,
            payload("Pie", &[(k.flour, 300), (k.sugar, 100)], &[k.dinner, k.lunch]),
        )
        .unwrap();

        let mut expected = vec![(k.flour, 300), (k.sugar, 100)];
        expected.sort();
        assert_eq!(lines(&db, recipe_id), expected);
        let mut expected_tags = vec![k.lunch, k.dinner];
        expected_tags.sort();
        assert_eq!(tags(&db, recipe_id), expected_tags);

        let recipe = Recipe::get_by_id(&db, recipe_id).unwrap().unwrap();
        assert_eq!(recipe.author_id, k.alice);
        assert!(recipe.short_code.is_none());
    }

    #[tokio::test]
    async fn same_name_is_rejected_for_the_same_author_only() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        create(&db, k.alice, payload("Pie", &[(k.flour, 1)], &[k.lunch])).unwrap();

        let second = create(&db, k.alice, payload("Pie", &[(k.sugar, 1)], &[k.dinner]));
        assert!(matches!(second, Err(RecipeError::DuplicateRecipe)));

        create(&db, k.bob, payload("Pie", &[(k.flour, 1)], &[k.lunch])).unwrap();
    }

    #[tokio::test]
    async fn update_replaces_every_line() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let recipe_id =
            create(&db, k.alice, payload("Pie", &[(k.flour, 300), (k.sugar, 100)], &[k.lunch]))
                .unwrap();
        let before = Recipe::get_by_id(&db, recipe_id).unwrap().unwrap();

        let changes = RecipeForWrite {
            name: None,
            text: None,
            cooking_time: Some(90),
            image: None,
            ..payload("", &[(k.milk, 250)], &[k.dinner])
        };
        update(&db, recipe_id, changes).unwrap();

        assert_eq!(lines(&db, recipe_id), vec![(k.milk, 250)]);
        assert_eq!(tags(&db, recipe_id), vec![k.dinner]);
        let after = Recipe::get_by_id(&db, recipe_id).unwrap().unwrap();
        assert_eq!(after.cooking_time, 90);
        assert_eq!(after.name, before.name);
        assert_eq!(after.pub_date, before.pub_date);
    }

    #[tokio::test]
    async fn failed_update_leaves_the_recipe_untouched() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let recipe_id =
            create(&db, k.alice, payload("Pie", &[(k.flour, 300)], &[k.lunch])).unwrap();

        // The ingredient exists, the tag does not: nothing may be written.
        let result = update(&db, recipe_id, payload("Tart", &[(k.milk, 1)], &[9_999]));
        assert!(matches!(result, Err(RecipeError::UnknownTag(9_999))));

        let recipe = Recipe::get_by_id(&db, recipe_id).unwrap().unwrap();
        assert_eq!(recipe.name, "Pie");
        assert_eq!(lines(&db, recipe_id), vec![(k.flour, 300)]);
        assert_eq!(tags(&db, recipe_id), vec![k.lunch]);
    }

    #[tokio::test]
    async fn failed_create_leaves_nothing_behind() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let result = create(&db, k.alice, payload("Pie", &[(k.flour, 1), (4_242, 1)], &[k.lunch]));
        assert!(matches!(result, Err(RecipeError::UnknownIngredient(4_242))));
        assert_eq!(db.count("SELECT COUNT(*) FROM Recipe", []).unwrap(), 0);
    }

    #[tokio::test]
    async fn renaming_onto_another_recipe_is_rejected() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        create(&db, k.alice, payload("Pie", &[(k.flour, 1)], &[k.lunch])).unwrap();
        let tart = create(&db, k.alice, payload("Tart", &[(k.flour, 1)], &[k.lunch])).unwrap();

        let result = update(&db, tart, payload("Pie", &[(k.flour, 1)], &[k.lunch]));
        assert!(matches!(result, Err(RecipeError::DuplicateRecipe)));

        // Keeping its own name is fine
        update(&db, tart, payload("Tart", &[(k.sugar, 2)], &[k.lunch])).unwrap();
    }

    #[tokio::test]
    async fn updating_a_missing_recipe_fails() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let result = update(&db, 77, payload("Pie", &[(k.flour, 1)], &[k.lunch]));
        assert!(matches!(result, Err(RecipeError::RecipeNotFound)));
    }

    #[tokio::test]
    async fn parallel_authors_all_get_their_recipes_stored() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let authors: Vec<i64> = (0..8)
            .map(|n| testing::user(&db, &format!("cook{n}")))
            .collect();

        let failures: Vec<RecipeError> = std::thread::scope(|scope| {
            let workers: Vec<_> = authors
                .iter()
                .map(|&author_id| {
                    let db = db.clone();
                    scope.spawn(move || {
                        (0..10)
                            .filter_map(|n| {
                                let body = payload(
                                    &format!("Dish {n}"),
                                    &[(k.flour, 100), (k.milk, n + 1)],
                                    &[k.lunch],
                                );
                                create(&db, author_id, body).err()
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        assert!(failures.is_empty(), "failed writes: {failures:?}");
        let stored = db.count("SELECT COUNT(*) FROM Recipe", []).unwrap();
        assert_eq!(stored, 80);
        let lines = db
            .count("SELECT COUNT(*) FROM RecipeIngredient", [])
            .unwrap();
        assert_eq!(lines, 160);
    }

    #[tokio::test]
    async fn storage_rejects_repeated_lines_without_validation() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let recipe_id = create(&db, k.alice, payload("Pie", &[(k.flour, 1)], &[k.lunch])).unwrap();

        let mut conn = db.pool.get().unwrap();
        let tx = conn.transaction().unwrap();
        let components = Components {
            ingredients: vec![(k.sugar, 1), (k.sugar, 2)],
            tags: vec![k.lunch],
        };
        let result = replace_components(&tx, recipe_id, &components);
        assert!(matches!(result, Err(RecipeError::DuplicateIngredient(id)) if id == k.sugar));
    }
}
