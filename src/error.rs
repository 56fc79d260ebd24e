use thiserror::Error;

/// Failures surfaced to callers as values. Recoverable conditions are not
/// errors here: an absent log source becomes a zero-progress aggregation
/// report, and individual deletion failures during a purge are carried in
/// the purge outcome's error text.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),

    #[error("full purge requires explicit confirmation")]
    ConfirmationRequired,
}
