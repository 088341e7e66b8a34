use timetravel_core_types::{TabId, Timestamp};
use timetravel_session_store::SessionStore;

use crate::errors::{PageStateError, PageStateResult};
use crate::model::TimeWindow;

/// Window from the tab's settled navigation up to `end`.
///
/// The anchor is the last main-frame navigation that was not an http redirect; the window opens
/// when it responded (or was initiated, if no response was recorded). Its final URL is returned
/// so callers can bucket sessions by the page they actually landed on.
pub async fn anchored_window(
    store: &dyn SessionStore,
    tab_id: TabId,
    end: Timestamp,
) -> PageStateResult<(TimeWindow, String)> {
    let (frames, navigations) = tokio::try_join!(store.frames(), store.frame_navigations())?;
    let missing = || PageStateError::MissingNavigation { tab_id };

    let main_frame = frames
        .iter()
        .find(|frame| frame.tab_id == tab_id && frame.is_main_frame())
        .ok_or_else(missing)?;
    let navigation = navigations
        .iter()
        .rev()
        .find(|nav| nav.frame_id == main_frame.id && !nav.is_redirect())
        .ok_or_else(missing)?;

    let start = navigation
        .http_responded_time
        .unwrap_or(navigation.initiated_time);
    let window = TimeWindow::new(start, end.max(start))?;
    Ok((window, navigation.effective_url().to_string()))
}
