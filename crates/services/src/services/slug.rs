//! Public profile slugs for cleaners.

use db::{
    is_unique_violation,
    models::cleaner::{Cleaner, CreateCleaner},
};
use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::{debug, warn};
use utils::text::{random_suffix, slugify};

const NUMBERED_ATTEMPTS: u32 = 5;
const RANDOM_ATTEMPTS: usize = 5;
const RANDOM_SUFFIX_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum SlugError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("no free slug for '{0}'")]
    Exhausted(String),
}

/// Ordered candidates for `base`: the base itself, `base-2` to `base-5`, then
/// random four-character suffixes.
pub fn slug_candidates(base: &str) -> Vec<String> {
    let mut candidates = Vec::with_capacity(NUMBERED_ATTEMPTS as usize + RANDOM_ATTEMPTS);
    candidates.push(base.to_string());
    candidates.extend((2..=NUMBERED_ATTEMPTS).map(|n| format!("{base}-{n}")));
    candidates.extend(
        (0..RANDOM_ATTEMPTS).map(|_| format!("{base}-{}", random_suffix(RANDOM_SUFFIX_LEN))),
    );
    candidates
}

/// Insert the cleaner under the first free slug derived from `name`. Each
/// attempt is a plain insert against the unique index; only unique violations
/// move on to the next candidate.
pub async fn create_cleaner_with_slug(
    conn: &mut SqliteConnection,
    data: &CreateCleaner,
    name: &str,
) -> Result<Cleaner, SlugError> {
    let base = slugify(name);

    for candidate in slug_candidates(&base) {
        match Cleaner::create(&mut *conn, data, &candidate).await {
            Ok(cleaner) => {
                debug!(slug = %cleaner.slug, "Allocated cleaner slug");
                return Ok(cleaner);
            }
            Err(e) if is_unique_violation(&e) => {
                debug!(slug = %candidate, "Slug taken, trying next candidate");
            }
            Err(e) => return Err(e.into()),
        }
    }

    warn!(base = %base, "Slug candidates exhausted");
    Err(SlugError::Exhausted(base))
}
