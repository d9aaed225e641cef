use std::collections::HashSet;

use fg::basic_models::{IngredientAmount, RecipeForWrite};

use crate::models::MAX_SMALL_INT;

#[derive(thiserror::Error, Debug)]
pub enum RecipeError {
    #[error("Choose at least one ingredient.")]
    EmptyIngredientList,
    #[error("Ingredient amount must be between 1 and 32767, got {0}.")]
    InvalidAmount(i64),
    #[error("Ingredient {0} is listed more than once.")]
    DuplicateIngredient(i64),
    #[error("Choose at least one tag.")]
    EmptyTagList,
    #[error("Tag {0} is listed more than once.")]
    DuplicateTag(i64),
    #[error("This field is required.")]
    MissingRequiredField(&'static str),
    #[error("This field may not be blank.")]
    BlankField(&'static str),
    #[error("Cooking time must be between 1 and 32767 minutes, got {0}.")]
    InvalidCookingTime(i64),
    #[error("Ingredient {0} does not exist.")]
    UnknownIngredient(i64),
    #[error("Tag {0} does not exist.")]
    UnknownTag(i64),
    #[error("You already have a recipe with this name.")]
    DuplicateRecipe,
    #[error("Recipe not found.")]
    RecipeNotFound,
    /// Several fields failed at once, in the order they were checked.
    #[error("{}", itertools::join(.0, " "))]
    Invalid(Vec<RecipeError>),
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl RecipeError {
    /// The payload field this error is reported under, or `None` for errors
    /// that are not the client's fault.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            RecipeError::EmptyIngredientList
            | RecipeError::InvalidAmount(_)
            | RecipeError::DuplicateIngredient(_)
            | RecipeError::UnknownIngredient(_) => Some("ingredients"),
            RecipeError::EmptyTagList | RecipeError::DuplicateTag(_) | RecipeError::UnknownTag(_) => {
                Some("tags")
            }
            RecipeError::MissingRequiredField(field) | RecipeError::BlankField(field) => {
                Some(*field)
            }
            RecipeError::InvalidCookingTime(_) => Some("cooking_time"),
            RecipeError::DuplicateRecipe => Some("non_field_errors"),
            RecipeError::RecipeNotFound
            | RecipeError::Invalid(_)
            | RecipeError::Storage(_)
            | RecipeError::Pool(_) => None,
        }
    }

    /// Client-facing messages paired with the field each belongs to. Empty
    /// for errors that are not the client's fault.
    pub fn messages(&self) -> Vec<(&'static str, String)> {
        match self {
            RecipeError::Invalid(errors) => errors.iter().flat_map(|err| err.messages()).collect(),
            other => other
                .field()
                .map(|field| (field, other.to_string()))
                .into_iter()
                .collect(),
        }
    }

    /// One error stays as it is; several are reported together.
    fn gathered(mut errors: Vec<RecipeError>) -> RecipeError {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            RecipeError::Invalid(errors)
        }
    }
}

/// The associations of a recipe once they are known to be non-empty and free of repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Components {
    /// (ingredient id, amount), in request order
    pub ingredients: Vec<(i64, i64)>,
    /// Tag ids, in request order
    pub tags: Vec<i64>,
}

/// A validated create request: every field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    pub image: String,
    pub components: Components,
}

/// A validated update request. Scalar fields are replaced only when present;
/// the associations are always replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    pub image: Option<String>,
    pub components: Components,
}

/// Validate a create request. Every field is checked, so the error lists all
/// fields at fault (ingredients first, then tags), one message per field.
pub fn validate_create(payload: RecipeForWrite) -> Result<NewRecipe, RecipeError> {
    let mut errors = Vec::new();
    let components = check_components(&mut errors, payload.ingredients, payload.tags);
    let name = keep(&mut errors, required("name", payload.name).and_then(|n| not_blank("name", n)));
    let text = keep(&mut errors, required("text", payload.text).and_then(|t| not_blank("text", t)));
    let cooking_time = keep(
        &mut errors,
        payload
            .cooking_time
            .ok_or(RecipeError::MissingRequiredField("cooking_time"))
            .and_then(cooking_time_in_range),
    );
    let image = keep(&mut errors, required("image", payload.image).and_then(|i| not_blank("image", i)));
    match (components, name, text, cooking_time, image) {
        (Some(components), Some(name), Some(text), Some(cooking_time), Some(image)) => Ok(NewRecipe {
            name,
            text,
            cooking_time,
            image,
            components,
        }),
        _ => Err(RecipeError::gathered(errors)),
    }
}

/// Validate a partial update. `ingredients` and `tags` are still mandatory.
pub fn validate_update(payload: RecipeForWrite) -> Result<RecipeChanges, RecipeError> {
    let mut errors = Vec::new();
    let components = check_components(&mut errors, payload.ingredients, payload.tags);
    let name = keep(&mut errors, payload.name.map(|n| not_blank("name", n)).transpose());
    let text = keep(&mut errors, payload.text.map(|t| not_blank("text", t)).transpose());
    let cooking_time = keep(&mut errors, payload.cooking_time.map(cooking_time_in_range).transpose());
    let image = keep(&mut errors, payload.image.map(|i| not_blank("image", i)).transpose());
    match (components, name, text, cooking_time, image) {
        (Some(components), Some(name), Some(text), Some(cooking_time), Some(image)) => {
            Ok(RecipeChanges {
                name,
                text,
                cooking_time,
                image,
                components,
            })
        }
        _ => Err(RecipeError::gathered(errors)),
    }
}

fn check_components(
    errors: &mut Vec<RecipeError>,
    ingredients: Option<Vec<IngredientAmount>>,
    tags: Option<Vec<i64>>,
) -> Option<Components> {
    let ingredients = ingredients
        .ok_or(RecipeError::MissingRequiredField("ingredients"))
        .and_then(|i| validate_ingredients(&i));
    let tags = tags
        .ok_or(RecipeError::MissingRequiredField("tags"))
        .and_then(|t| validate_tags(&t));
    let ingredients = keep(errors, ingredients);
    let tags = keep(errors, tags);
    Some(Components {
        ingredients: ingredients?,
        tags: tags?,
    })
}

/// The value on success; otherwise the error joins `errors`.
fn keep<T>(errors: &mut Vec<RecipeError>, result: Result<T, RecipeError>) -> Option<T> {
    result.map_err(|err| errors.push(err)).ok()
}

pub fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<Vec<(i64, i64)>, RecipeError> {
    if ingredients.is_empty() {
        return Err(RecipeError::EmptyIngredientList);
    }
    let mut seen = HashSet::new();
    ingredients
        .iter()
        .map(|item| {
            if !(1..=MAX_SMALL_INT).contains(&item.amount) {
                return Err(RecipeError::InvalidAmount(item.amount));
            }
            if !seen.insert(item.id) {
                return Err(RecipeError::DuplicateIngredient(item.id));
            }
            Ok((item.id, item.amount))
        })
        .collect()
}

pub fn validate_tags(tags: &[i64]) -> Result<Vec<i64>, RecipeError> {
    if tags.is_empty() {
        return Err(RecipeError::EmptyTagList);
    }
    let mut seen = HashSet::new();
    tags.iter()
        .map(|&tag| {
            if seen.insert(tag) {
                Ok(tag)
            } else {
                Err(RecipeError::DuplicateTag(tag))
            }
        })
        .collect()
}

fn required(field: &'static str, value: Option<String>) -> Result<String, RecipeError> {
    value.ok_or(RecipeError::MissingRequiredField(field))
}

fn not_blank(field: &'static str, value: String) -> Result<String, RecipeError> {
    if value.trim().is_empty() {
        Err(RecipeError::BlankField(field))
    } else {
        Ok(value)
    }
}

fn cooking_time_in_range(minutes: i64) -> Result<i64, RecipeError> {
    if (1..=MAX_SMALL_INT).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(RecipeError::InvalidCookingTime(minutes))
    }
}
