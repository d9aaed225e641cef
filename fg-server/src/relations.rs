//! The three user-owned pairings: favourite recipes, the shopping cart and
//! author subscriptions. Each is a set of unique (actor, target) pairs that is
//! only ever added to or removed from.

use rusqlite::params;

use crate::database::{is_check_violation, is_unique_violation, Database};

#[derive(thiserror::Error, Debug)]
pub enum ToggleError {
    #[error("{0} already added.")]
    AlreadyExists(&'static str),
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error("You cannot subscribe to yourself.")]
    SelfFollowForbidden,
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub trait Relation {
    /// Table holding the pairs; the actor is always its `user_id` column
    const TABLE: &'static str;
    const TARGET_COLUMN: &'static str;
    /// How the relation is named in messages
    const LABEL: &'static str;

    /// Reject pairs that can never exist, whatever is stored.
    fn check(_actor_id: i64, _target_id: i64) -> Result<(), ToggleError> {
        Ok(())
    }

    fn add(db: &Database, actor_id: i64, target_id: i64) -> Result<(), ToggleError> {
        Self::check(actor_id, target_id)?;
        let conn = db.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (user_id, {}) VALUES (?, ?)",
                Self::TABLE,
                Self::TARGET_COLUMN
            ),
            params![actor_id, target_id],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ToggleError::AlreadyExists(Self::LABEL)
            } else if is_check_violation(&e) {
                ToggleError::SelfFollowForbidden
            } else {
                e.into()
            }
        })?;
        tracing::debug!(table = Self::TABLE, actor_id, target_id, "Added pair");
        Ok(())
    }

    fn remove(db: &Database, actor_id: i64, target_id: i64) -> Result<(), ToggleError> {
        let conn = db.pool.get()?;
        let removed = conn.execute(
            &format!(
                "DELETE FROM {} WHERE user_id = ? AND {} = ?",
                Self::TABLE,
                Self::TARGET_COLUMN
            ),
            params![actor_id, target_id],
        )?;
        if removed == 0 {
            return Err(ToggleError::NotFound(Self::LABEL));
        }
        tracing::debug!(table = Self::TABLE, actor_id, target_id, "Removed pair");
        Ok(())
    }

    #[cfg(test)]
    fn exists(db: &Database, actor_id: i64, target_id: i64) -> Result<bool, ToggleError> {
        let conn = db.pool.get()?;
        Ok(conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ? AND {} = ?)",
                Self::TABLE,
                Self::TARGET_COLUMN
            ),
            params![actor_id, target_id],
            |row| row.get(0),
        )?)
    }
}

/// A user's favourite recipes
pub struct Favourite;

impl Relation for Favourite {
    const TABLE: &'static str = "Favourite";
    const TARGET_COLUMN: &'static str = "recipe_id";
    const LABEL: &'static str = "Favourite";
}

/// Recipes whose ingredients go on the user's shopping list
pub struct ShoppingCart;

impl Relation for ShoppingCart {
    const TABLE: &'static str = "ShoppingCart";
    const TARGET_COLUMN: &'static str = "recipe_id";
    const LABEL: &'static str = "Shopping cart entry";
}

/// Authors a user is subscribed to
pub struct Follow;

impl Relation for Follow {
    const TABLE: &'static str = "Follow";
    const TARGET_COLUMN: &'static str = "author_id";
    const LABEL: &'static str = "Subscription";

    fn check(actor_id: i64, target_id: i64) -> Result<(), ToggleError> {
        if actor_id == target_id {
            Err(ToggleError::SelfFollowForbidden)
        } else {
            Ok(())
        }
    }
}

/// The authors `user_id` follows, in subscription order, one page at a time.
pub fn followed_author_ids(
    db: &Database,
    user_id: i64,
    offset: i64,
    limit: i64,
) -> anyhow::Result<Vec<i64>> {
    let conn = db.pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT author_id FROM Follow WHERE user_id = ? ORDER BY rowid LIMIT ? OFFSET ?",
    )?;
    let ids = stmt
        .query_map(params![user_id, limit, offset], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

pub fn count_followed(db: &Database, user_id: i64) -> anyhow::Result<i64> {
    db.count(
        "SELECT COUNT(*) FROM Follow WHERE user_id = ?",
        params![user_id],
    )
}
