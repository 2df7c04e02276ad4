pub type BakeResult<T> = Result<T, BakeError>;

#[derive(thiserror::Error, Debug)]
pub enum BakeError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("material graph error: {0}")]
    Graph(String),

    #[error("image conflict: {0}")]
    ImageConflict(String),

    #[error("host error: {0}")]
    Host(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BakeError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    pub fn image_conflict(msg: impl Into<String>) -> Self {
        Self::ImageConflict(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Precondition violations abort before anything was mutated.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
