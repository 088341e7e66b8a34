use thiserror::Error;
use timetravel_core_types::TabId;
use timetravel_session_store::StoreError;

#[derive(Debug, Error)]
pub enum PageStateError {
    #[error("tab {tab_id} has no main-frame navigation to anchor a window on")]
    MissingNavigation { tab_id: TabId },
    #[error("invalid window [{start}, {end}]")]
    InvalidWindow { start: i64, end: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type PageStateResult<T> = Result<T, PageStateError>;
