use thiserror::Error;

use timetravel_core_types::TabId;

#[derive(Clone, Debug, Error)]
pub enum StoreErrorKind {
    #[error("session not loaded: {0}")]
    SessionMissing(String),
    #[error("unknown tab {0}")]
    UnknownTab(TabId),
    #[error("failed to read session file: {0}")]
    Read(String),
    #[error("failed to decode session data: {0}")]
    Decode(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct StoreError(pub StoreErrorKind);

impl StoreError {
    pub fn new(kind: StoreErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &StoreErrorKind {
        &self.0
    }
}

impl From<StoreErrorKind> for StoreError {
    fn from(kind: StoreErrorKind) -> Self {
        StoreError(kind)
    }
}
