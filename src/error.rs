use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("tag name `{0}` already exists")]
    DuplicateName(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl CatalogError {
    /// Stable machine-readable code used in CLI error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::MissingField(_) => "missing_field",
            Self::NotFound { .. } => "not_found",
            Self::DuplicateName(_) => "duplicate_name",
            Self::Store(_) => "store_error",
        }
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
