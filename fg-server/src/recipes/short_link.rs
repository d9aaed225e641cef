use rand::RngCore;
use rusqlite::params;

use crate::database::{is_unique_violation, Database};

/// How many fresh codes to try before giving up on a crowded code space.
const MAX_ATTEMPTS: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum ShortLinkError {
    #[error("Could not find a free short code after {0} attempts")]
    CodeSpaceExhausted(usize),
    #[error("Recipe not found.")]
    RecipeNotFound,
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Six lowercase hex characters from three random bytes.
pub fn random_code() -> String {
    let mut bytes = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Give a recipe a new short code, replacing any previous one, and return it.
pub fn assign(db: &Database, recipe_id: i64) -> Result<String, ShortLinkError> {
    assign_with(db, recipe_id, random_code)
}

/// Like [`assign`] but drawing candidate codes from `next_code`.
///
/// The unique index on `short_code` decides whether a candidate is free, so
/// two concurrent requests can never end up sharing a code.
pub fn assign_with(
    db: &Database,
    recipe_id: i64,
    mut next_code: impl FnMut() -> String,
) -> Result<String, ShortLinkError> {
    let conn = db.pool.get()?;
    for _ in 0..MAX_ATTEMPTS {
        let code = next_code();
        match conn.execute(
            "UPDATE Recipe SET short_code = ? WHERE recipe_id = ?",
            params![code, recipe_id],
        ) {
            Ok(0) => return Err(ShortLinkError::RecipeNotFound),
            Ok(_) => {
                tracing::info!(recipe_id, code = %code, "Assigned short link");
                return Ok(code);
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(recipe_id, code = %code, "Short code taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    tracing::error!(recipe_id, "Ran out of short code attempts");
    Err(ShortLinkError::CodeSpaceExhausted(MAX_ATTEMPTS))
}

/// The public URL for a short code.
pub fn link_for(base_url: &str, code: &str) -> String {
    format!("{}/r/{}/", base_url.trim_end_matches('/'), code)
}
