use thiserror::Error;

/// Typed error hierarchy for bulletin.
///
/// Used at module boundaries (address book, session lifecycle, dispatch, config).
/// Leaf functions keep using `anyhow::Result`; the `Internal` variant lets `?`
/// lift those into this type.
#[derive(Debug, Error)]
pub enum BulletinError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Session is already connected")]
    AlreadyConnected,

    #[error("Session is not connected")]
    NotConnected,

    #[error("Cooldown active, retry in {remaining_secs}s")]
    CooldownActive { remaining_secs: u64 },

    #[error("A dispatch batch is already in progress")]
    BatchInProgress,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `BulletinError`.
pub type BulletinResult<T> = std::result::Result<T, BulletinError>;

impl BulletinError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether the caller may retry the same operation later unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CooldownActive { .. } | Self::Internal(_) => true,
            Self::Validation(_)
            | Self::NotFound { .. }
            | Self::AlreadyConnected
            | Self::NotConnected
            | Self::BatchInProgress
            | Self::Config(_) => false,
        }
    }
}
