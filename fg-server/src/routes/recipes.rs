use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::{Query, WithRejection};
use fg::basic_models::RecipeForWrite;
use serde::Deserialize;
use serde_json::json;

use super::{flag, AppState};
use crate::auth::{CurrentUser, MaybeUser};
use crate::errors::{WebError, WebResult};
use crate::models::{Recipe, RecipeFilter, RecipeSummary, User};
use crate::pagination::{Page, Pagination};
use crate::recipes::{reader, shopping_list, short_link, writer, FullRecipe, Viewer};
use crate::relations::{Favourite, Relation, ShoppingCart};

#[derive(Debug, Deserialize, Default)]
pub struct RecipeQuery {
    author: Option<i64>,
    /// Tag slugs; a recipe matches when it carries any of them
    #[serde(default)]
    tags: Vec<String>,
    is_favorited: Option<String>,
    is_in_shopping_cart: Option<String>,
}

pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(pagination): Query<Pagination>,
    Query(query): Query<RecipeQuery>,
) -> WebResult<Json<Page<FullRecipe>>> {
    let viewer = Viewer::load(&state.db, user.as_ref())?;
    // Personal filters mean nothing to anonymous visitors, so they are ignored.
    let filter = RecipeFilter {
        author_id: query.author,
        tag_slugs: query.tags,
        favourited_by: viewer
            .user_id
            .filter(|_| flag(query.is_favorited.as_deref())),
        in_cart_of: viewer
            .user_id
            .filter(|_| flag(query.is_in_shopping_cart.as_deref())),
    };
    let (recipes, count) =
        Recipe::list_page(&state.db, &filter, pagination.offset(), pagination.limit())?;
    let results = reader::read_many(&state.db, recipes, &viewer)?;
    Ok(Json(pagination.wrap(results, count)))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<Json<FullRecipe>> {
    let viewer = Viewer::load(&state.db, user.as_ref())?;
    let recipe = reader::read_one(&state.db, recipe_id, &viewer)?.ok_or(WebError::NotFound)?;
    Ok(Json(recipe))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    WithRejection(Json(payload), _): WithRejection<Json<RecipeForWrite>, WebError>,
) -> WebResult<(StatusCode, Json<FullRecipe>)> {
    tracing::info!(user_id = user.user_id, ?payload, "Creating recipe");
    let recipe_id = writer::create(&state.db, user.user_id, payload)?;
    let viewer = Viewer::load(&state.db, Some(&user))?;
    let recipe = reader::read_one(&state.db, recipe_id, &viewer)?.ok_or(WebError::NotFound)?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// The recipe, provided `user` is allowed to change it.
fn editable_recipe(state: &AppState, recipe_id: i64, user: &User) -> WebResult<Recipe> {
    let recipe = Recipe::get_by_id(&state.db, recipe_id)?.ok_or(WebError::NotFound)?;
    if recipe.editable_by(user) {
        Ok(recipe)
    } else {
        Err(WebError::PermissionDenied)
    }
}

pub async fn update_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
    WithRejection(Json(payload), _): WithRejection<Json<RecipeForWrite>, WebError>,
) -> WebResult<Json<FullRecipe>> {
    editable_recipe(&state, recipe_id, &user)?;
    writer::update(&state.db, recipe_id, payload)?;
    let viewer = Viewer::load(&state.db, Some(&user))?;
    let recipe = reader::read_one(&state.db, recipe_id, &viewer)?.ok_or(WebError::NotFound)?;
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<StatusCode> {
    editable_recipe(&state, recipe_id, &user)?;
    if Recipe::delete(&state.db, recipe_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::NotFound)
    }
}

/// Pair the user with an existing recipe and answer with the recipe's short form.
fn add_pair<R: Relation>(
    state: &AppState,
    user: &User,
    recipe_id: i64,
) -> WebResult<(StatusCode, Json<RecipeSummary>)> {
    let recipe = Recipe::get_by_id(&state.db, recipe_id)?.ok_or(WebError::NotFound)?;
    R::add(&state.db, user.user_id, recipe_id)?;
    Ok((StatusCode::CREATED, Json(RecipeSummary::from(&recipe))))
}

fn remove_pair<R: Relation>(state: &AppState, user: &User, recipe_id: i64) -> WebResult<StatusCode> {
    Recipe::get_by_id(&state.db, recipe_id)?.ok_or(WebError::NotFound)?;
    R::remove(&state.db, user.user_id, recipe_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favourite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<(StatusCode, Json<RecipeSummary>)> {
    add_pair::<Favourite>(&state, &user, recipe_id)
}

pub async fn remove_favourite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<StatusCode> {
    remove_pair::<Favourite>(&state, &user, recipe_id)
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<(StatusCode, Json<RecipeSummary>)> {
    add_pair::<ShoppingCart>(&state, &user, recipe_id)
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> WebResult<StatusCode> {
    remove_pair::<ShoppingCart>(&state, &user, recipe_id)
}

pub async fn get_link(
    State(state): State<AppState>,
    Path(recipe_id): Path<i64>,
) -> WebResult<impl IntoResponse> {
    let code = short_link::assign(&state.db, recipe_id)?;
    Ok(Json(json!({
        "short-link": short_link::link_for(state.base_url(), &code)
    })))
}

pub async fn download_shopping_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> WebResult<impl IntoResponse> {
    let lines = shopping_list::collect(&state.db, user.user_id)?;
    let text = shopping_list::render(&lines)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"shopping_list.txt\"",
            ),
        ],
        text,
    ))
}
