use serde::{Deserialize, Serialize};

/// The body of a recipe create or update request.
///
/// Every field is optional on the wire so that missing fields can be reported
/// per field by the server instead of failing deserialization as a whole.
#[derive(Deserialize, Serialize, Clone, Default)]
pub struct RecipeForWrite {
    pub name: Option<String>,
    pub text: Option<String>,
    #[serde(default, deserialize_with = "integer::option")]
    pub cooking_time: Option<i64>,
    pub image: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

impl std::fmt::Debug for RecipeForWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeForWrite")
            .field("name", &self.name)
            .field("cooking_time", &self.cooking_time)
            .field("image", &self.image.as_ref().map(|i| i.len()))
            .field("tags", &self.tags)
            .field("ingredients", &self.ingredients)
            .finish()
    }
}

/// One ingredient reference and the amount of it a recipe uses.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    #[serde(deserialize_with = "integer::required")]
    pub id: i64,
    #[serde(deserialize_with = "integer::required")]
    pub amount: i64,
}

/// Integers that may also arrive as decimal strings, as form-minded clients send them.
mod integer {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Number(i64),
        Text(String),
    }

    impl Loose {
        fn parse<E: de::Error>(self) -> Result<i64, E> {
            match self {
                Loose::Number(n) => Ok(n),
                Loose::Text(text) => text
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("A valid integer is required, not {text:?}."))),
            }
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Loose::deserialize(deserializer)?.parse()
    }

    pub fn option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<Loose>::deserialize(deserializer)?
            .map(Loose::parse)
            .transpose()
    }
}
