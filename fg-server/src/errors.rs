use std::{collections::HashMap, fmt::Display};

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use itertools::Itertools;
use serde_json::json;

use crate::recipes::{RecipeError, ShortLinkError};
use crate::relations::ToggleError;

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Internal Server Error: {0:#}")]
    Internal(#[from] anyhow::Error),
    #[error("Templating error: {0:#}")]
    Template(#[from] minijinja::Error),
    #[error(transparent)]
    Recipe(#[from] RecipeError),
    #[error(transparent)]
    Toggle(#[from] ToggleError),
    #[error(transparent)]
    ShortLink(#[from] ShortLinkError),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error("{0}")]
    Auth(String),
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,
    #[error("Not found.")]
    NotFound,
}

impl WebError {
    fn internal(err: &dyn Display) -> Response {
        tracing::error!("{err}");
        // In development, we want to return the error message
        // In production, we want to return a generic error message
        let message = if cfg!(debug_assertions) {
            err.to_string()
        } else {
            "Internal Server Error".into()
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": message }))).into_response()
    }

    fn detail(status: StatusCode, message: impl Display) -> Response {
        (status, Json(json!({ "detail": message.to_string() }))).into_response()
    }

    /// A body that parsed as JSON but not as the payload type. The message
    /// starts with the path of the offending value, which names the field.
    fn unreadable_field(body_text: &str) -> Response {
        let reason = body_text
            .split_once("target type: ")
            .map_or(body_text, |(_, reason)| reason);
        let named = reason
            .split_once(": ")
            .filter(|(path, _)| !path.contains(' '))
            .and_then(|(path, message)| {
                let field = path.split(['.', '[']).next()?;
                (!field.is_empty()).then_some((field, message))
            });
        let body = match named {
            Some((field, message)) => json!({ field: [message] }),
            None => json!({ "non_field_errors": [reason] }),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let display = self.to_string();
        match self {
            WebError::Internal(err) => Self::internal(&format!("{err:#}")),
            WebError::Template(err) => Self::internal(&err),
            WebError::Recipe(RecipeError::RecipeNotFound) => WebError::NotFound.into_response(),
            WebError::Recipe(err) => {
                let messages = err.messages();
                if messages.is_empty() {
                    return Self::internal(&err);
                }
                let by_field: HashMap<&str, Vec<String>> = messages.into_iter().into_group_map();
                (StatusCode::BAD_REQUEST, Json(by_field)).into_response()
            }
            WebError::Toggle(err @ (ToggleError::Storage(_) | ToggleError::Pool(_))) => {
                Self::internal(&err)
            }
            WebError::Toggle(err) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": err.to_string() })),
            )
                .into_response(),
            WebError::ShortLink(ShortLinkError::RecipeNotFound) => {
                WebError::NotFound.into_response()
            }
            WebError::ShortLink(err) => Self::internal(&err),
            WebError::Json(JsonRejection::JsonDataError(err)) => {
                Self::unreadable_field(&err.body_text())
            }
            WebError::Json(JsonRejection::JsonSyntaxError(err)) => {
                Self::detail(StatusCode::BAD_REQUEST, err.body_text())
            }
            WebError::Json(err) => Self::detail(err.status(), err.body_text()),
            // Auth failures are always explained
            WebError::Auth(msg) => Self::detail(StatusCode::UNAUTHORIZED, msg),
            WebError::PermissionDenied => Self::detail(StatusCode::FORBIDDEN, display),
            WebError::NotFound => Self::detail(StatusCode::NOT_FOUND, display),
        }
    }
}
