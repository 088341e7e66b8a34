use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tick_timeline::stitch::build::tick_order;
use tick_timeline::{
    SessionTicks, TickEventType, TickTimeline, TickTimelineService, TicksRequest,
    TimelinePolicyHandle, TimelinePolicyView, TlError,
};
use timetravel_core_types::{CommandId, FrameId, NodeId, SessionId, TabId};
use timetravel_session_store::model::{
    CommandRecord, DomActionKind, DomMutationRecord, FocusEventKind, FocusRecord, FrameNavigation,
    FrameRecord, MouseEventKind, MouseEventRecord, ScrollRecord, SessionData, SessionInteractions,
    SessionRecord, TabRecord,
};
use timetravel_session_store::{InMemorySessionStore, SessionStore};

fn mutation(
    tab: u32,
    frame: u32,
    ts: i64,
    idx: u32,
    action: DomActionKind,
    text: Option<&str>,
) -> DomMutationRecord {
    DomMutationRecord {
        tab_id: TabId(tab),
        frame_id: FrameId(frame),
        timestamp: ts,
        event_index: idx,
        command_id: None,
        action,
        node_id: NodeId(idx + 1),
        parent_node_id: None,
        previous_sibling_id: None,
        node_type: None,
        tag_name: None,
        text_content: text.map(str::to_string),
        attributes: BTreeMap::new(),
    }
}

fn navigation(id: u32, tab: u32, frame: u32, url: &str, redirected: bool) -> FrameNavigation {
    FrameNavigation {
        id,
        tab_id: TabId(tab),
        frame_id: FrameId(frame),
        requested_url: url.to_string(),
        final_url: None,
        initiated_time: 1_000 + id as i64,
        http_responded_time: None,
        http_redirected_time: redirected.then_some(1_002),
    }
}

fn command(id: u32, name: &str, tab: Option<u32>, start: i64) -> CommandRecord {
    CommandRecord {
        id: CommandId(id),
        name: name.to_string(),
        label: Some(name.to_string()),
        start_time: start,
        tab_id: tab.map(TabId),
        ..CommandRecord::default()
    }
}

/// Tab 1 navigates twice, tab 2 is detached from tab 1, tab 3 never navigated.
fn fixture() -> Arc<InMemorySessionStore> {
    let mut click = command(2, "click", Some(1), 1_300);
    click.frame_id = Some(FrameId(1));
    click.result_node_ids = Some(vec![NodeId(7)]);

    let mut detach = command(3, "detachTab", Some(1), 1_400);
    detach.result_type = Some("Object".into());
    detach.result = Some(json!({
        "detachedTab": { "id": 2, "parentTabId": 1 },
        "detachedState": {
            "url": "http://a/page2",
            "domChangeRange": { "timestampRange": [1_100, 1_200], "indexRange": [2, 4] }
        }
    }));

    let mut broken_detach = command(4, "detachTab", Some(1), 1_450);
    broken_detach.result_type = Some("Object".into());
    broken_detach.result = Some(json!("not json"));

    InMemorySessionStore::from_data(SessionData {
        session: SessionRecord {
            id: SessionId::from("session-ticks"),
            start_time: 1_000,
            close_time: Some(2_000),
        },
        tabs: vec![
            TabRecord {
                id: TabId(1),
                created_time: 1_000,
                viewport_width: 1280,
                viewport_height: 720,
                ..TabRecord::default()
            },
            TabRecord {
                id: TabId(2),
                parent_id: Some(TabId(1)),
                detached_at_command_id: Some(CommandId(3)),
                created_time: 1_500,
                ..TabRecord::default()
            },
            TabRecord {
                id: TabId(3),
                created_time: 1_000,
                ..TabRecord::default()
            },
        ],
        frames: vec![
            FrameRecord {
                id: FrameId(1),
                tab_id: TabId(1),
                ..FrameRecord::default()
            },
            FrameRecord {
                id: FrameId(11),
                tab_id: TabId(1),
                parent_id: Some(FrameId(1)),
                dom_node_path: Some("/HTML/BODY/IFRAME".into()),
            },
            FrameRecord {
                id: FrameId(2),
                tab_id: TabId(2),
                ..FrameRecord::default()
            },
        ],
        navigations: vec![
            navigation(1, 1, 1, "http://a/redirect", true),
            navigation(2, 1, 1, "http://a/start", false),
            navigation(3, 2, 2, "http://a/detached", false),
        ],
        commands: vec![
            command(1, "goto", Some(1), 1_005),
            click,
            detach,
            broken_detach,
            command(5, "late", None, 2_500),
        ],
        dom_changes: vec![
            mutation(1, 1, 1_010, 0, DomActionKind::NewDocument, Some("http://a/start")),
            mutation(1, 1, 1_010, 1, DomActionKind::Added, None),
            mutation(1, 1, 1_100, 2, DomActionKind::Added, None),
            mutation(1, 11, 1_100, 3, DomActionKind::Added, None),
            mutation(1, 1, 1_200, 4, DomActionKind::Added, None),
            mutation(1, 1, 1_200, 5, DomActionKind::Added, None),
            mutation(1, 1, 1_600, 6, DomActionKind::NewDocument, Some("http://a/next")),
            mutation(1, 99, 1_650, 7, DomActionKind::Added, None),
            mutation(2, 2, 1_700, 8, DomActionKind::Added, None),
        ],
        interactions: SessionInteractions {
            mouse: vec![MouseEventRecord {
                tab_id: TabId(1),
                frame_id: FrameId(1),
                timestamp: 1_620,
                event: MouseEventKind::Down,
                target_node_id: Some(NodeId(8)),
                page_x: 10,
                page_y: 20,
            }],
            focus: vec![FocusRecord {
                tab_id: TabId(1),
                frame_id: FrameId(1),
                timestamp: 1_050,
                event: FocusEventKind::In,
                target_node_id: Some(NodeId(9)),
            }],
            scroll: vec![
                ScrollRecord {
                    tab_id: TabId(1),
                    frame_id: FrameId(1),
                    timestamp: 1_630,
                    scroll_x: 0,
                    scroll_y: 300,
                },
                ScrollRecord {
                    tab_id: TabId(2),
                    frame_id: FrameId(2),
                    timestamp: 1_710,
                    scroll_x: 0,
                    scroll_y: 40,
                },
            ],
        },
    })
}

fn service(view: TimelinePolicyView) -> TickTimelineService {
    let store: Arc<dyn SessionStore> = fixture();
    TickTimelineService::quiet(store, TimelinePolicyHandle::new_with(view))
}

async fn build(req: TicksRequest) -> SessionTicks {
    service(TimelinePolicyView::default())
        .session_ticks(req)
        .await
        .expect("session ticks")
}

#[tokio::test]
async fn ticks_are_totally_ordered_within_the_timeline() {
    let ticks = build(TicksRequest::default()).await;
    assert_eq!(ticks.session_id, SessionId::from("session-ticks"));

    for details in &ticks.tab_details {
        for pair in details.ticks.windows(2) {
            assert!(tick_order(&pair[0], &pair[1]).is_le());
        }
        for tick in &details.ticks {
            let offset = tick.timeline_offset_percent.expect("offset assigned");
            assert!((0.0..=100.0).contains(&offset));
        }
    }

    let tab = ticks.tab(TabId(1)).unwrap();
    assert!(!tab
        .ticks
        .iter()
        .any(|tick| tick.command_id == Some(CommandId(5))));
    let kinds: Vec<&str> = tab.ticks.iter().map(|t| t.event_type.as_str()).collect();
    assert_eq!(
        kinds,
        vec![
            "init", "command", "paint", "focus", "paint", "paint", "command", "command", "command",
            "paint", "mouse", "scroll"
        ]
    );
}

#[tokio::test]
async fn context_falls_back_to_start_url_and_resets_on_new_documents() {
    let ticks = build(TicksRequest::default()).await;
    let tab = ticks.tab(TabId(1)).unwrap();
    assert_eq!(tab.tab.start_url, "http://a/start");

    let init = &tab.ticks[0];
    assert_eq!(init.event_type, TickEventType::Init);
    assert_eq!(init.document_url, "http://a/start");
    assert_eq!(init.paint_event_index, None);

    let goto = &tab.ticks[1];
    assert!(goto.is_major);
    assert_eq!(goto.label.as_deref(), Some("goto"));
    assert_eq!(goto.document_load_paint_index, None);

    let second_document = tab
        .ticks
        .iter()
        .position(|t| t.is_new_document_tick && t.document_url == "http://a/next")
        .unwrap();
    for tick in &tab.ticks[second_document..] {
        assert_eq!(tick.document_url, "http://a/next");
        assert_eq!(tick.document_load_paint_index, Some(3));
        assert_eq!(tick.focus_event_index, None);
    }
    let scroll = tab.ticks.last().unwrap();
    assert_eq!(scroll.paint_event_index, Some(3));
    assert_eq!(scroll.mouse_event_index, Some(0));
    assert_eq!(scroll.scroll_event_index, Some(0));
}

#[tokio::test]
async fn highlights_follow_focus_commands_and_mouse() {
    let ticks = build(TicksRequest::default()).await;
    let tab = ticks.tab(TabId(1)).unwrap();
    let highlighted = |kind: TickEventType| {
        tab.ticks
            .iter()
            .find(|t| t.event_type == kind)
            .and_then(|t| t.highlight_node_ids.clone())
            .map(|h| h.node_ids)
    };

    assert_eq!(highlighted(TickEventType::Focus), Some(vec![NodeId(9)]));
    assert_eq!(highlighted(TickEventType::Mouse), Some(vec![NodeId(8)]));

    let click = tab
        .ticks
        .iter()
        .find(|t| t.command_id == Some(CommandId(2)))
        .unwrap();
    let highlight = click.highlight_node_ids.as_ref().unwrap();
    assert_eq!(highlight.node_ids, vec![NodeId(7)]);
    assert_eq!(highlight.frame_id, Some(FrameId(1)));

    let second_document = tab
        .ticks
        .iter()
        .find(|t| t.is_new_document_tick && t.document_url == "http://a/next")
        .unwrap();
    assert!(second_document.highlight_node_ids.is_none());
}

#[tokio::test]
async fn detached_tab_starts_from_spliced_parent_history() {
    let ticks = build(TicksRequest {
        include_paint_events: Some(true),
        ..TicksRequest::default()
    })
    .await;
    let tab = ticks.tab(TabId(2)).unwrap();
    assert_eq!(tab.tab.detached_from_tab_id, Some(TabId(1)));

    let commits = tab.paint_events.as_ref().unwrap();
    let spliced: Vec<u32> = commits[0].changes.iter().map(|c| c.event_index).collect();
    assert_eq!(spliced, vec![2, 3, 4]);
    assert_eq!(commits[0].timestamp, 1_501);
    assert_eq!(commits[0].command_id, Some(CommandId(3)));
    assert_eq!(commits.len(), 2);

    let kinds: Vec<(&str, usize)> = tab
        .ticks
        .iter()
        .map(|t| (t.event_type.as_str(), t.event_type_index))
        .collect();
    assert_eq!(
        kinds,
        vec![("init", 0), ("paint", 0), ("paint", 1), ("scroll", 0)]
    );

    let synthetic = &tab.ticks[1];
    assert!(synthetic.is_new_document_tick);
    assert!(!synthetic.is_major);
    assert_eq!(synthetic.document_url, "http://a/page2");
    assert_eq!(synthetic.command_id, Some(CommandId(3)));
    assert_eq!(tab.ticks[2].document_url, "http://a/page2");
    assert_eq!(tab.ticks[2].document_load_paint_index, Some(0));

    assert_eq!(tab.documents.len(), 2);
    assert!(tab.documents.iter().all(|doc| doc.paint_commit_index == 0));
}

#[tokio::test]
async fn failures_stay_local_to_their_tab_or_detach() {
    let ticks = build(TicksRequest::default()).await;
    assert_eq!(ticks.tab_details.len(), 2);
    assert!(ticks.tab(TabId(3)).is_none());
    assert!(!ticks.report.is_clean());

    assert_eq!(ticks.report.failed_tabs.len(), 1);
    assert!(matches!(
        ticks.report.failed_tabs[0].error,
        TlError::MissingNavigationRecord { tab_id } if tab_id == TabId(3)
    ));

    assert_eq!(ticks.report.skipped_detaches.len(), 1);
    assert!(matches!(
        ticks.report.skipped_detaches[0],
        TlError::MalformedDetachPayload { command_id, .. } if command_id == CommandId(4)
    ));
}

#[tokio::test]
async fn raw_collections_follow_inclusion_flags() {
    let view = TimelinePolicyView {
        include_commands: true,
        ..TimelinePolicyView::default()
    };
    let service = service(view);

    let ticks = service.session_ticks(TicksRequest::default()).await.unwrap();
    let tab = ticks.tab(TabId(1)).unwrap();
    assert_eq!(tab.commands.as_ref().map(Vec::len), Some(5));
    assert!(tab.mouse.is_none());
    assert!(tab.paint_events.is_none());

    let ticks = service
        .session_ticks(TicksRequest {
            include_commands: Some(false),
            include_interaction_events: Some(true),
            ..TicksRequest::default()
        })
        .await
        .unwrap();
    let tab = ticks.tab(TabId(1)).unwrap();
    assert!(tab.commands.is_none());
    assert_eq!(tab.mouse.as_ref().map(Vec::len), Some(1));
    assert_eq!(tab.focus.as_ref().map(Vec::len), Some(1));
    assert_eq!(tab.scroll.as_ref().map(Vec::len), Some(1));
}

#[tokio::test]
async fn policy_updates_apply_to_later_builds() {
    let store: Arc<dyn SessionStore> = fixture();
    let (service, handle) = TickTimelineService::with_store_and_policy(
        store,
        TimelinePolicyHandle::new_with(TimelinePolicyView::default()),
    );
    let ticks = service.session_ticks(TicksRequest::default()).await.unwrap();
    assert!(ticks.tab(TabId(1)).unwrap().paint_events.is_none());

    handle.update(TimelinePolicyView {
        include_paint_events: true,
        ..handle.snapshot()
    });
    assert!(service.policy_view().include_paint_events);
    let ticks = service.session_ticks(TicksRequest::default()).await.unwrap();
    assert!(ticks.tab(TabId(1)).unwrap().paint_events.is_some());
}

#[tokio::test]
async fn services_keep_independent_policies() {
    let (painted, handle) = TickTimelineService::with_store_and_policy(
        fixture(),
        TimelinePolicyHandle::new_with(TimelinePolicyView::default()),
    );
    let (plain, _) = TickTimelineService::with_store_and_policy(
        fixture(),
        TimelinePolicyHandle::new_with(TimelinePolicyView::default()),
    );
    handle.update(TimelinePolicyView {
        include_paint_events: true,
        ..handle.snapshot()
    });

    let painted_ticks = painted.session_ticks(TicksRequest::default()).await.unwrap();
    let plain_ticks = plain.session_ticks(TicksRequest::default()).await.unwrap();
    assert!(painted_ticks.tab(TabId(1)).unwrap().paint_events.is_some());
    assert!(plain_ticks.tab(TabId(1)).unwrap().paint_events.is_none());
    assert!(!plain.policy_view().include_paint_events);
}

#[tokio::test]
async fn export_writes_jsonl_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/ticks.jsonl");
    let view = TimelinePolicyView {
        log_enable: true,
        log_path: path.to_string_lossy().into_owned(),
        ..TimelinePolicyView::default()
    };

    let result = service(view).export(TicksRequest::default()).await.unwrap();
    assert_eq!(result.stats.total_tabs, 2);
    assert_eq!(result.stats.failed_tabs, 1);
    assert_eq!(result.stats.skipped_detaches, 1);
    assert!(result.lines.is_none());

    let written = std::fs::read_to_string(result.path.unwrap()).unwrap();
    let lines: Vec<serde_json::Value> = written
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0]["line"], "header");
    assert_eq!(lines[1]["line"], "tab");
    assert_eq!(lines[3]["line"], "failure");
    assert_eq!(lines[3]["tab_id"], 3);
    assert_eq!(lines[4]["line"], "skipped_detach");
    assert!(lines[4]["error"]
        .as_str()
        .unwrap()
        .starts_with("detach command"));
    assert_eq!(lines[5]["total_ticks"], result.stats.total_ticks);
    assert_eq!(lines[5]["skipped_detaches"], 1);
}

#[tokio::test]
async fn export_returns_lines_in_memory_by_default() {
    let result = service(TimelinePolicyView::default())
        .export(TicksRequest::default())
        .await
        .unwrap();
    assert!(result.path.is_none());
    assert_eq!(result.lines.map(|lines| lines.len()), Some(6));
}
