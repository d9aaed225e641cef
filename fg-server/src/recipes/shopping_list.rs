use anyhow::Result;
use minijinja::context;
use rusqlite::params;
use serde::Serialize;

use crate::database::{Database, FromRow};

lazy_static::lazy_static! {
    static ref TEMPLATES: minijinja::Environment<'static> = {
        let mut env = minijinja::Environment::new();
        env.add_template(
            "shopping_list.txt.jinja",
            include_str!("../../templates/shopping_list.txt.jinja"),
        )
        .expect("Failed to register template");
        env
    };
}

/// How much of one ingredient the whole cart needs.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ShoppingLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl FromRow for ShoppingLine {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get("name")?,
            measurement_unit: row.get("measurement_unit")?,
            amount: row.get("amount")?,
        })
    }
}

/// Sum the ingredients of every recipe in a user's cart, by ingredient name.
pub fn collect(db: &Database, user_id: i64) -> Result<Vec<ShoppingLine>> {
    db.collect_rows(
        "SELECT Ingredient.name, Ingredient.measurement_unit, SUM(RecipeIngredient.amount) AS amount
        FROM ShoppingCart
        INNER JOIN RecipeIngredient ON RecipeIngredient.recipe_id = ShoppingCart.recipe_id
        INNER JOIN Ingredient ON Ingredient.ingredient_id = RecipeIngredient.ingredient_id
        WHERE ShoppingCart.user_id = ?
        GROUP BY Ingredient.ingredient_id
        ORDER BY Ingredient.name, Ingredient.ingredient_id",
        params![user_id],
    )
}

/// Render the downloadable plain text list.
pub fn render(lines: &[ShoppingLine]) -> Result<String, minijinja::Error> {
    TEMPLATES
        .get_template("shopping_list.txt.jinja")?
        .render(context! { lines => lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::{Relation, ShoppingCart};
    use crate::testing::{self, Kitchen};

    #[tokio::test]
    async fn shared_ingredients_are_summed() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let cake = testing::create_recipe(&db, k.alice, "Cake", &[(k.flour, 100), (k.milk, 200)], &[k.dinner]);
        let bread = testing::create_recipe(&db, k.alice, "Bread", &[(k.flour, 50)], &[k.lunch]);
        let soup = testing::create_recipe(&db, k.alice, "Soup", &[(k.sugar, 7)], &[k.lunch]);
        ShoppingCart::add(&db, k.bob, cake).unwrap();
        ShoppingCart::add(&db, k.bob, bread).unwrap();
        // only bob's cart counts
        ShoppingCart::add(&db, k.alice, soup).unwrap();

        let lines = collect(&db, k.bob).unwrap();
        assert_eq!(
            lines,
            vec![
                ShoppingLine {
                    name: "flour".into(),
                    measurement_unit: "g".into(),
                    amount: 150
                },
                ShoppingLine {
                    name: "milk".into(),
                    measurement_unit: "ml".into(),
                    amount: 200
                },
            ]
        );
    }

    #[test]
    fn renders_one_line_per_ingredient() {
        let text = render(&[
            ShoppingLine {
                name: "flour".into(),
                measurement_unit: "g".into(),
                amount: 150,
            },
            ShoppingLine {
                name: "milk".into(),
                measurement_unit: "ml".into(),
                amount: 200,
            },
        ])
        .unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            ["Shopping list:", "* flour (g) - 150", "* milk (ml) - 200"]
        );
    }

    #[tokio::test]
    async fn empty_cart_says_so() {
        let (db, _dir) = testing::temp_db().await;
        let k = Kitchen::seed(&db);
        let lines = collect(&db, k.bob).unwrap();
        assert!(lines.is_empty());
        assert_eq!(render(&lines).unwrap().trim(), "Your shopping cart is empty.");
    }

    #[test]
    fn names_are_not_html_escaped() {
        let text = render(&[ShoppingLine {
            name: "salt & pepper".into(),
            measurement_unit: "<pinch>".into(),
            amount: 1,
        }])
        .unwrap();
        assert!(text.contains("* salt & pepper (<pinch>) - 1"));
    }
}
