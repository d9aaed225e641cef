use axum::{
    extract::{FromRef, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::cache::FgCache;
use crate::config::Config;
use crate::database::Database;
use crate::errors::{WebError, WebResult};
use crate::models::Recipe;

mod catalog;
mod recipes;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub cache: FgCache,
    pub config: Config,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl AppState {
    /// Public origin without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.config.server.base_url.trim_end_matches('/')
    }
}

/// Truthy query flags, as sent by the web client (`1`) or by hand (`true`).
fn flag(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "True"))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        // `GET /health` goes to `health`
        .route("/health", get(health))
        // `GET /r/:code/` resolves a short link
        .route("/r/:code/", get(follow_short_link))
        .route("/r/:code", get(follow_short_link))
        .route("/api/tags", get(catalog::list_tags))
        .route("/api/tags/:tag_id", get(catalog::get_tag))
        .route("/api/ingredients", get(catalog::list_ingredients))
        .route("/api/ingredients/:ingredient_id", get(catalog::get_ingredient))
        .route(
            "/api/recipes",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/api/recipes/download_shopping_cart",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/api/recipes/:recipe_id",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/api/recipes/:recipe_id/favorite",
            post(recipes::add_favourite).delete(recipes::remove_favourite),
        )
        .route(
            "/api/recipes/:recipe_id/shopping_cart",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .route("/api/recipes/:recipe_id/get-link", get(recipes::get_link))
        .route("/api/users", get(users::list_users))
        .route("/api/users/me", get(users::me))
        .route("/api/users/subscriptions", get(users::subscriptions))
        .route("/api/users/:user_id", get(users::get_user))
        .route(
            "/api/users/:user_id/subscribe",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .layer(
            tower_http::compression::CompressionLayer::new()
                .quality(tower_http::CompressionLevel::Fastest),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn follow_short_link(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> WebResult<impl IntoResponse> {
    let recipe = Recipe::get_by_short_code(&state.db, &code)?.ok_or(WebError::NotFound)?;
    let target = format!("{}/recipes/{}", state.base_url(), recipe.recipe_id);
    Ok((StatusCode::FOUND, [(header::LOCATION, target)]))
}
