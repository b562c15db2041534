use crate::key::ModuleKey;

/// Errors raised by the [`Registry`](crate::Registry).
///
/// Resolution failures never show up here: a loader retries them until it
/// succeeds.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no module registered under `{0}`")]
    UnknownModule(ModuleKey),

    #[error("module `{key}` resolves to `{registered}`, not `{requested}`")]
    TypeMismatch {
        key: ModuleKey,
        registered: &'static str,
        requested: &'static str,
    },

    #[error("module `{key}` collides with already registered `{registered}`")]
    KeyCollision {
        key: ModuleKey,
        registered: ModuleKey,
    },

    #[error("preloading was aborted")]
    Aborted(#[from] tokio::task::JoinError),
}
