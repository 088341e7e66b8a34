use timetravel_session_store::model::{FrameNavigation, FrameRecord, TabRecord};

use crate::errors::{TlError, TlResult};
use crate::model::{SessionFrame, SessionTab};

/// Resolves a tab's main frame and starting navigation.
///
/// Redirected navigations are skipped; the first remaining navigation of the main frame is the
/// tab's start.
pub fn resolve_tab(
    tab: &TabRecord,
    frames: &[FrameRecord],
    navigations: &[FrameNavigation],
) -> TlResult<SessionTab> {
    let missing = || TlError::MissingNavigationRecord { tab_id: tab.id };

    let tab_frames: Vec<&FrameRecord> = frames.iter().filter(|f| f.tab_id == tab.id).collect();
    let main_frame = tab_frames
        .iter()
        .find(|f| f.is_main_frame())
        .ok_or_else(missing)?;
    let start_navigation = navigations
        .iter()
        .filter(|nav| !nav.is_redirect())
        .find(|nav| nav.frame_id == main_frame.id)
        .ok_or_else(missing)?;

    Ok(SessionTab {
        id: tab.id,
        created_time: tab.created_time,
        detached_from_tab_id: tab.detached_at_command_id.and(tab.parent_id),
        start_url: start_navigation.effective_url().to_string(),
        width: tab.viewport_width,
        height: tab.viewport_height,
        frames: tab_frames
            .iter()
            .map(|f| SessionFrame {
                id: f.id,
                is_main_frame: f.is_main_frame(),
                dom_node_path: f.dom_node_path.clone(),
            })
            .collect(),
    })
}
