use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::database::Database;
use crate::errors::{WebError, WebResult};
use crate::models::{Recipe, RecipeSummary, User};
use crate::pagination::{Page, Pagination};
use crate::recipes::{UserProfile, Viewer};
use crate::relations::{self, Follow, Relation};

#[derive(Debug, Deserialize, Default)]
pub struct RecipesLimit {
    /// How many of each author's recipes to include; all of them when absent
    recipes_limit: Option<i64>,
}

/// An author as shown in someone's subscriptions: their profile and newest recipes.
#[derive(Debug, Serialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

impl Subscription {
    fn load(db: &Database, author: User, viewer: &Viewer, limit: Option<i64>) -> anyhow::Result<Self> {
        let limit = limit.filter(|l| *l >= 0);
        let recipes = Recipe::list_by_author(db, author.user_id, limit)?
            .iter()
            .map(RecipeSummary::from)
            .collect();
        Ok(Self {
            recipes_count: Recipe::count_by_author(db, author.user_id)?,
            recipes,
            profile: UserProfile::new(author, viewer),
        })
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(pagination): Query<Pagination>,
) -> WebResult<Json<Page<UserProfile>>> {
    let viewer = Viewer::load(&state.db, user.as_ref())?;
    let users = User::list_page(&state.db, pagination.offset(), pagination.limit())?
        .into_iter()
        .map(|u| UserProfile::new(u, &viewer))
        .collect();
    Ok(Json(pagination.wrap(users, User::count_all(&state.db)?)))
}

pub async fn get_user(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(user_id): Path<i64>,
) -> WebResult<Json<UserProfile>> {
    let viewer = Viewer::load(&state.db, user.as_ref())?;
    let found = User::get_by_id(&state.db, user_id)?.ok_or(WebError::NotFound)?;
    Ok(Json(UserProfile::new(found, &viewer)))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserProfile> {
    // Nobody follows themselves
    Json(UserProfile::new(user, &Viewer::anonymous()))
}

pub async fn subscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
    Query(query): Query<RecipesLimit>,
) -> WebResult<(StatusCode, Json<Subscription>)> {
    let author = User::get_by_id(&state.db, author_id)?.ok_or(WebError::NotFound)?;
    Follow::add(&state.db, user.user_id, author_id)?;
    let viewer = Viewer::load(&state.db, Some(&user))?;
    let subscription = Subscription::load(&state.db, author, &viewer, query.recipes_limit)?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
) -> WebResult<StatusCode> {
    User::get_by_id(&state.db, author_id)?.ok_or(WebError::NotFound)?;
    Follow::remove(&state.db, user.user_id, author_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pagination): Query<Pagination>,
    Query(query): Query<RecipesLimit>,
) -> WebResult<Json<Page<Subscription>>> {
    let viewer = Viewer::load(&state.db, Some(&user))?;
    let author_ids = relations::followed_author_ids(
        &state.db,
        user.user_id,
        pagination.offset(),
        pagination.limit(),
    )?;
    let mut authors = User::get_many(&state.db, &author_ids)?;
    // keep subscription order
    authors.sort_by_key(|a| author_ids.iter().position(|id| *id == a.user_id));
    let results = authors
        .into_iter()
        .map(|author| Subscription::load(&state.db, author, &viewer, query.recipes_limit))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let count = relations::count_followed(&state.db, user.user_id)?;
    Ok(Json(pagination.wrap(results, count)))
}
