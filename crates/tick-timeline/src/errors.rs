use thiserror::Error;
use timetravel_core_types::{CommandId, TabId};
use timetravel_session_store::StoreError;

#[derive(Debug, Error)]
pub enum TlError {
    #[error("tab {tab_id} has no resolvable main frame or starting navigation")]
    MissingNavigationRecord { tab_id: TabId },
    #[error("detach command {command_id} carried an unusable result: {reason}")]
    MalformedDetachPayload {
        command_id: CommandId,
        reason: String,
    },
    #[error("payload exceeds maximum line budget")]
    Oversize,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TlError {
    pub fn malformed_detach(command_id: CommandId, reason: impl Into<String>) -> Self {
        Self::MalformedDetachPayload {
            command_id,
            reason: reason.into(),
        }
    }
}

pub type TlResult<T> = Result<T, TlError>;
