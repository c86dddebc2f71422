use thiserror::Error;

/// Error taxonomy for the repository layer.
///
/// Mirrors the object-store's own failures (`StoreError`) alongside errors the
/// repository raises itself (`UnknownClass`, `InitInsideTransaction`,
/// `CannotDowngrade`) and the two store conditions the repository forwards
/// verbatim (`NotFound`, `AlreadyExists`).
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("item '{0}' not found")]
    NotFound(String),

    #[error("item '{0}' already exists")]
    AlreadyExists(String),

    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("initialize() called from inside a transaction")]
    InitInsideTransaction,

    #[error("repository record version {found} is newer than the supported version {supported}; cannot downgrade")]
    CannotDowngrade { found: u32, supported: u32 },

    #[error("object store error: {0}")]
    StoreError(String),

    #[error("user error: {0}")]
    UserError(String),
}

pub type Result<T> = std::result::Result<T, RepoError>;

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        Self::StoreError(format!("(de)serialization failed: {err}"))
    }
}

