use anyhow::Result;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use rusqlite::params;
use sha2::Digest;

use crate::database::Database;
use crate::errors::WebError;
use crate::models::User;

/// Bearer tokens are issued by a separate service, which stores their digest here.
pub struct AuthToken;

impl AuthToken {
    /// Hex SHA-256 of a raw token, the form in which tokens are stored.
    pub fn digest(token: &str) -> String {
        hex::encode(sha2::Sha256::digest(token.as_bytes()))
    }

    /// Record a token for a user.
    pub fn push(db: &Database, user_id: i64, token: &str) -> Result<()> {
        let conn = db.pool.get()?;
        conn.execute(
            "INSERT INTO AuthToken (token_hash, user_id) VALUES (?, ?)",
            params![Self::digest(token), user_id],
        )?;
        Ok(())
    }

    /// The owner of a raw token, if the token is known.
    pub fn find_user(db: &Database, token: &str) -> Result<Option<User>> {
        Ok(db
            .collect_rows(
                "SELECT User.* FROM AuthToken
                INNER JOIN User ON User.user_id = AuthToken.user_id
                WHERE AuthToken.token_hash = ?",
                params![Self::digest(token)],
            )?
            .pop())
    }
}

/// The raw token of an `Authorization: Token <key>` or `Bearer <key>` header.
fn presented_token(parts: &Parts) -> Result<Option<&str>, WebError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let bad = || WebError::Auth("Invalid token header.".into());
    let value = value.to_str().map_err(|_| bad())?;
    let token = value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(bad)?;
    Ok(Some(token))
}

/// The requester, who must be signed in.
pub struct CurrentUser(pub User);

/// The requester, if signed in. A token that is presented but unknown is still rejected.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = presented_token(parts)? else {
            return Ok(MaybeUser(None));
        };
        let db = Database::from_ref(state);
        let user = AuthToken::find_user(&db, token)?
            .ok_or_else(|| WebError::Auth("Invalid token.".into()))?;
        Ok(MaybeUser(Some(user)))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(CurrentUser(user)),
            MaybeUser(None) => Err(WebError::Auth(
                "Authentication credentials were not provided.".into(),
            )),
        }
    }
}
