use thiserror::Error;

/// Errors the engine surfaces to its callers. Everything durable lives in
/// SQLite, so database failures are the whole story here; the client and
/// delivery layers carry their own typed errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
