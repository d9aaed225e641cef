use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::Query;
use serde::Deserialize;

use super::AppState;
use crate::cache::{CacheQuery, CacheValue};
use crate::errors::{WebError, WebResult};
use crate::models::{Ingredient, Tag};

pub async fn list_tags(State(state): State<AppState>) -> WebResult<Json<Vec<Tag>>> {
    match state
        .cache
        .get_value_or_guard_async(&CacheQuery::AllTags)
        .await
    {
        Ok(CacheValue::Tags { tags }) => Ok(Json(tags)),
        Err(guard) => {
            tracing::info!("Loading tag catalog");
            let tags = Tag::list_all(&state.db)?;
            // Err means the entry was replaced meanwhile
            let _ = guard.insert(CacheValue::Tags { tags: tags.clone() });
            Ok(Json(tags))
        }
    }
}

pub async fn get_tag(
    State(state): State<AppState>,
    Path(tag_id): Path<i64>,
) -> WebResult<Json<Tag>> {
    Ok(Json(
        Tag::get_by_id(&state.db, tag_id)?.ok_or(WebError::NotFound)?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    /// Case-insensitive name prefix
    name: Option<String>,
}

pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> WebResult<Json<Vec<Ingredient>>> {
    let prefix = query.name.unwrap_or_default();
    Ok(Json(Ingredient::search(&state.db, prefix.trim())?))
}

pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(ingredient_id): Path<i64>,
) -> WebResult<Json<Ingredient>> {
    Ok(Json(
        Ingredient::get_by_id(&state.db, ingredient_id)?.ok_or(WebError::NotFound)?,
    ))
}
