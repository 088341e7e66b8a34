use std::collections::BTreeMap;
use std::sync::Arc;

use page_state::{
    anchored_window, AssertResult, PageStateError, PageStateGenerator, PageStateSnapshot,
    StateFingerprint, TimeWindow,
};
use timetravel_core_types::{FrameId, NodeId, SessionId, TabId, Timestamp};
use timetravel_session_store::model::{
    DomActionKind, DomMutationRecord, FrameNavigation, FrameRecord, SessionRecord, TabRecord,
};
use timetravel_session_store::InMemorySessionStore;

const TAB: TabId = TabId(1);
const FRAME: FrameId = FrameId(1);
const LIST_ITEMS: &str = "count(/HTML/BODY/UL/LI)";

struct Recording {
    id: SessionId,
    store: Arc<InMemorySessionStore>,
    next_index: u32,
}

impl Recording {
    fn new(id: &str) -> Self {
        let store = InMemorySessionStore::new(SessionRecord {
            id: SessionId::from(id),
            start_time: 0,
            close_time: None,
        });
        store.append_tab(TabRecord {
            id: TAB,
            created_time: 0,
            ..TabRecord::default()
        });
        store.append_frame(FrameRecord {
            id: FRAME,
            tab_id: TAB,
            ..FrameRecord::default()
        });
        Self {
            id: SessionId::from(id),
            store,
            next_index: 0,
        }
    }

    fn push(
        &mut self,
        ts: Timestamp,
        action: DomActionKind,
        node: u32,
        parent: Option<u32>,
        previous: Option<u32>,
        customize: impl FnOnce(&mut DomMutationRecord),
    ) {
        let mut record = DomMutationRecord {
            tab_id: TAB,
            frame_id: FRAME,
            timestamp: ts,
            event_index: self.next_index,
            command_id: None,
            action,
            node_id: NodeId(node),
            parent_node_id: parent.map(NodeId),
            previous_sibling_id: previous.map(NodeId),
            node_type: None,
            tag_name: None,
            text_content: None,
            attributes: BTreeMap::new(),
        };
        customize(&mut record);
        self.next_index += 1;
        self.store.append_dom_changes([record]);
    }

    fn new_document(&mut self, ts: Timestamp, node: u32, url: &str) {
        self.push(ts, DomActionKind::NewDocument, node, None, None, |r| {
            r.text_content = Some(url.to_string())
        });
    }

    fn element(
        &mut self,
        ts: Timestamp,
        node: u32,
        parent: u32,
        previous: Option<u32>,
        tag: &str,
    ) {
        self.element_with(ts, node, parent, previous, tag, &[]);
    }

    fn element_with(
        &mut self,
        ts: Timestamp,
        node: u32,
        parent: u32,
        previous: Option<u32>,
        tag: &str,
        attributes: &[(&str, &str)],
    ) {
        self.push(ts, DomActionKind::Added, node, Some(parent), previous, |r| {
            r.tag_name = Some(tag.to_string());
            r.attributes = attributes
                .iter()
                .map(|(name, value)| (name.to_string(), Some(value.to_string())))
                .collect();
        });
    }

    fn text(&mut self, ts: Timestamp, node: u32, parent: u32, value: &str) {
        self.push(ts, DomActionKind::Added, node, Some(parent), None, |r| {
            r.text_content = Some(value.to_string())
        });
    }

    fn remove(&mut self, ts: Timestamp, node: u32) {
        self.push(ts, DomActionKind::Removed, node, None, None, |_| {});
    }

    fn set_attribute(&mut self, ts: Timestamp, node: u32, name: &str, value: &str) {
        self.push(ts, DomActionKind::Attribute, node, None, None, |r| {
            r.attributes.insert(name.to_string(), Some(value.to_string()));
        });
    }

    fn navigate(
        &self,
        id: u32,
        url: &str,
        initiated: Timestamp,
        responded: Option<Timestamp>,
        redirected: Option<Timestamp>,
    ) {
        self.store.append_navigation(FrameNavigation {
            id,
            tab_id: TAB,
            frame_id: FRAME,
            requested_url: url.to_string(),
            final_url: None,
            initiated_time: initiated,
            http_responded_time: responded,
            http_redirected_time: redirected,
        });
    }

    /// `<html><head><title>Test</title></head><body><div>hello</div><ul>items</ul></body></html>`
    ///
    /// List items get ids 100, 102, ... with their text node right after. Returns the id of the
    /// last item.
    fn list_page(&mut self, items: &[&str]) -> Option<u32> {
        self.new_document(0, 1, "http://site/list");
        self.element(0, 2, 1, None, "html");
        self.element(0, 3, 2, None, "head");
        self.element(0, 4, 3, None, "title");
        self.text(0, 5, 4, "Test");
        self.element(0, 6, 2, Some(3), "body");
        self.element(0, 7, 6, None, "div");
        self.text(0, 8, 7, "hello");
        self.element(0, 9, 6, Some(7), "ul");
        let mut last = None;
        for (position, item) in items.iter().enumerate() {
            let id = 100 + 2 * position as u32;
            self.element(0, id, 9, last, "li");
            self.text(0, id + 1, id, item);
            last = Some(id);
        }
        last
    }

    fn append_items(&mut self, ts: Timestamp, after: Option<u32>, items: &[&str]) {
        let mut last = after;
        for (position, item) in items.iter().enumerate() {
            let id = 200 + 2 * position as u32;
            self.element(ts, id, 9, last, "li");
            self.text(ts, id + 1, id, item);
            last = Some(id);
        }
    }

    fn register(&self, generator: &PageStateGenerator, state: &str) {
        generator.add_session(self.id.clone(), self.store.clone(), TAB, window());
        generator.add_state(state, self.id.clone());
    }
}

fn window() -> TimeWindow {
    TimeWindow::new(5, 100).unwrap()
}

/// Fails when `state` carries a query outside `allowed`, i.e. one that reads nodes the window
/// never touched.
fn assert_only_queries(state: &StateFingerprint, allowed: &[&str]) {
    for query in state.asserts_by_frame_id[&FRAME].keys() {
        assert!(
            allowed.contains(&query.as_str()),
            "unexpected assertion {query} in state {}",
            state.name
        );
    }
}

#[tokio::test]
async fn appended_items_are_counted_under_their_stable_list() {
    let generator = PageStateGenerator::new("lists");
    for id in ["s1", "s2", "s3"] {
        let mut rec = Recording::new(id);
        let last = rec.list_page(&["1"]);
        rec.append_items(10, last, &["2", "3"]);
        rec.register(&generator, "three items");
    }
    generator.evaluate().await.unwrap();

    let state = generator.state("three items").unwrap();
    assert_eq!(state.session_ids.len(), 3);
    assert_eq!(
        state.assertion(FRAME, LIST_ITEMS).unwrap().result,
        AssertResult::Count(3)
    );
    assert_eq!(
        state
            .assertion(FRAME, r#"count(//LI[text()="2"])"#)
            .unwrap()
            .result,
        AssertResult::Count(1)
    );
    let queries: Vec<&String> = state.asserts_by_frame_id[&FRAME].keys().collect();
    assert!(!queries.iter().any(|q| q.contains("TITLE")));
    assert!(!queries.iter().any(|q| q.contains("DIV")));
    assert!(!queries.iter().any(|q| q.ends_with("/UL)")));
    assert!(state.assertion(FRAME, "string(/HTML/BODY/UL/LI)").is_none());
    assert_only_queries(
        &state,
        &[
            LIST_ITEMS,
            r#"count(//LI[text()="2"])"#,
            r#"count(//LI[text()="3"])"#,
        ],
    );
}

#[tokio::test]
async fn different_outcomes_produce_different_states() {
    let generator = PageStateGenerator::new("lists");
    for id in ["a1", "a2"] {
        let mut rec = Recording::new(id);
        let last = rec.list_page(&["a", "b", "c"]);
        rec.append_items(10, last, &["d", "e"]);
        rec.register(&generator, "five");
    }
    for id in ["b1", "b2"] {
        let mut rec = Recording::new(id);
        rec.list_page(&[]);
        rec.append_items(10, None, &["only"]);
        rec.register(&generator, "one");
    }
    generator.evaluate().await.unwrap();

    let five = generator.state("five").unwrap();
    let one = generator.state("one").unwrap();
    assert_eq!(
        five.assertion(FRAME, LIST_ITEMS).unwrap().result,
        AssertResult::Count(5)
    );
    assert_eq!(
        one.assertion(FRAME, LIST_ITEMS).unwrap().result,
        AssertResult::Count(1)
    );
    assert_ne!(five.asserts_by_frame_id, one.asserts_by_frame_id);
    assert_eq!(generator.states_by_name().len(), 2);

    assert!(five.assertion(FRAME, "string(/HTML/BODY/UL/LI)").is_none());
    assert_only_queries(
        &five,
        &[
            LIST_ITEMS,
            r#"count(//LI[text()="d"])"#,
            r#"count(//LI[text()="e"])"#,
        ],
    );
    // The appended item is the list's only one, so string() reads it.
    assert_only_queries(
        &one,
        &[
            LIST_ITEMS,
            "string(/HTML/BODY/UL/LI)",
            r#"count(//LI[text()="only"])"#,
        ],
    );
}

#[tokio::test]
async fn removals_assert_the_remaining_count() {
    let generator = PageStateGenerator::new("removals");
    for id in ["r1", "r2"] {
        let mut rec = Recording::new(id);
        rec.list_page(&["1", "2", "3"]);
        rec.remove(10, 100);
        rec.remove(11, 102);
        rec.register(&generator, "removed two");
    }
    for id in ["r3", "r4"] {
        let mut rec = Recording::new(id);
        rec.list_page(&["1", "2", "3"]);
        rec.remove(10, 104);
        rec.register(&generator, "removed one");
    }
    generator.evaluate().await.unwrap();

    assert_eq!(
        generator
            .state("removed two")
            .unwrap()
            .assertion(FRAME, LIST_ITEMS)
            .unwrap()
            .result,
        AssertResult::Count(1)
    );
    assert_eq!(
        generator
            .state("removed one")
            .unwrap()
            .assertion(FRAME, LIST_ITEMS)
            .unwrap()
            .result,
        AssertResult::Count(2)
    );
}

#[tokio::test]
async fn attribute_changes_assert_the_full_attribute_set() {
    let generator = PageStateGenerator::new("sliders");
    for (id, state, width) in [
        ("f1", "full", "width: 100%;"),
        ("f2", "full", "width: 100%;"),
        ("h1", "half", "width: 50%;"),
    ] {
        let mut rec = Recording::new(id);
        rec.new_document(0, 1, "http://site/slider");
        rec.element(0, 2, 1, None, "html");
        rec.element(0, 3, 2, None, "body");
        rec.element_with(0, 10, 3, None, "div", &[("class", "slider")]);
        rec.set_attribute(20, 10, "style", width);
        rec.register(&generator, state);
    }
    generator.evaluate().await.unwrap();

    let full_query = r#"count(/HTML/BODY/DIV[@class="slider"][@style="width: 100%;"])"#;
    let half_query = r#"count(/HTML/BODY/DIV[@class="slider"][@style="width: 50%;"])"#;
    let full = generator.state("full").unwrap();
    let half = generator.state("half").unwrap();
    assert_eq!(
        full.assertion(FRAME, full_query).unwrap().result,
        AssertResult::Count(1)
    );
    assert!(full.assertion(FRAME, half_query).is_none());
    assert_eq!(
        half.assertion(FRAME, half_query).unwrap().result,
        AssertResult::Count(1)
    );
}

#[tokio::test]
async fn redirected_sessions_are_anchored_on_the_page_they_landed_on() {
    let mut landed = Vec::new();

    let mut redirected = Recording::new("redirected");
    redirected.navigate(1, "http://site/login", 1, None, Some(3));
    redirected.new_document(2, 1, "http://site/login");
    redirected.element(2, 2, 1, None, "html");
    redirected.element(2, 3, 2, None, "body");
    redirected.element(2, 4, 3, None, "h1");
    redirected.text(2, 5, 4, "Login");
    redirected.navigate(2, "http://site/page1", 3, Some(8), None);
    landed.push((redirected, "Page 1"));

    for (id, url, title) in [
        ("direct", "http://site/page1", "Page 1"),
        ("other", "http://site/page2", "Page 2"),
    ] {
        let rec = Recording::new(id);
        rec.navigate(1, url, 1, Some(8), None);
        landed.push((rec, title));
    }

    let generator = PageStateGenerator::new("pages");
    for (mut rec, title) in landed {
        rec.new_document(10, 20, "loaded");
        rec.element(10, 21, 20, None, "html");
        rec.element(10, 22, 21, None, "body");
        rec.element(10, 23, 22, None, "h1");
        rec.text(10, 24, 23, title);

        let (window, url) = anchored_window(rec.store.as_ref(), TAB, 50).await.unwrap();
        assert_eq!(window, TimeWindow::new(8, 50).unwrap());
        generator.add_session(rec.id.clone(), rec.store.clone(), TAB, window);
        generator.add_state(url, rec.id.clone());
    }
    generator.evaluate().await.unwrap();

    let page1 = generator.state("http://site/page1").unwrap();
    assert_eq!(page1.session_ids.len(), 2);
    assert_eq!(
        page1
            .assertion(FRAME, "string(/HTML/BODY/H1)")
            .unwrap()
            .result,
        AssertResult::Text("Page 1".into())
    );
    assert_eq!(
        page1
            .assertion(FRAME, r#"count(//H1[text()="Page 1"])"#)
            .unwrap()
            .result,
        AssertResult::Count(1)
    );
    assert!(page1
        .asserts_by_frame_id[&FRAME]
        .keys()
        .all(|query| !query.contains("Login")));

    let page2 = generator.state("http://site/page2").unwrap();
    assert_eq!(
        page2
            .assertion(FRAME, "string(/HTML/BODY/H1)")
            .unwrap()
            .result,
        AssertResult::Text("Page 2".into())
    );
}

#[tokio::test]
async fn anchoring_without_a_settled_navigation_fails() {
    let rec = Recording::new("nowhere");
    rec.navigate(1, "http://site/login", 1, None, Some(3));

    let err = anchored_window(rec.store.as_ref(), TAB, 50)
        .await
        .unwrap_err();
    assert!(matches!(err, PageStateError::MissingNavigation { tab_id } if tab_id == TAB));
}

#[tokio::test]
async fn registration_order_does_not_matter() {
    let sessions: Vec<Recording> = ["o1", "o2"]
        .into_iter()
        .map(|id| {
            let mut rec = Recording::new(id);
            let last = rec.list_page(&["1"]);
            rec.append_items(10, last, &["2"]);
            rec
        })
        .collect();

    let sessions_first = PageStateGenerator::new("first");
    for rec in &sessions {
        sessions_first.add_session(rec.id.clone(), rec.store.clone(), TAB, window());
    }
    for rec in &sessions {
        sessions_first.add_state("two", rec.id.clone());
    }

    let labels_first = PageStateGenerator::new("second");
    for rec in sessions.iter().rev() {
        labels_first.add_state("two", rec.id.clone());
    }
    labels_first.evaluate().await.unwrap();
    for rec in sessions.iter().rev() {
        labels_first.add_session(rec.id.clone(), rec.store.clone(), TAB, window());
    }

    sessions_first.evaluate().await.unwrap();
    labels_first.evaluate().await.unwrap();
    assert_eq!(sessions_first.state("two"), labels_first.state("two"));
    assert_eq!(sessions_first.state("two").unwrap().session_ids.len(), 2);
}

#[tokio::test]
async fn only_unanimous_results_survive() {
    let generator = PageStateGenerator::new("unanimous");
    for (id, text) in [("u1", "x"), ("u2", "y")] {
        let mut rec = Recording::new(id);
        let last = rec.list_page(&["1"]);
        rec.append_items(10, last, &[text]);
        rec.register(&generator, "two items");
    }
    generator.evaluate().await.unwrap();

    let state = generator.state("two items").unwrap();
    assert_eq!(
        state.assertion(FRAME, LIST_ITEMS).unwrap().result,
        AssertResult::Count(2)
    );
    assert!(state
        .assertion(FRAME, r#"count(//LI[text()="x"])"#)
        .is_none());
    assert!(state
        .assertion(FRAME, r#"count(//LI[text()="y"])"#)
        .is_none());
}

#[tokio::test]
async fn quiet_windows_do_not_veto_assertions() {
    let generator = PageStateGenerator::new("quiet");
    let mut busy = Recording::new("busy");
    let last = busy.list_page(&["1"]);
    busy.append_items(10, last, &["2"]);
    busy.register(&generator, "loaded");

    let mut quiet = Recording::new("quiet");
    quiet.list_page(&["1"]);
    quiet.register(&generator, "loaded");
    generator.evaluate().await.unwrap();

    let state = generator.state("loaded").unwrap();
    assert!(state.session_ids.contains(&SessionId::from("quiet")));
    assert_eq!(
        state.assertion(FRAME, LIST_ITEMS).unwrap().result,
        AssertResult::Count(2)
    );
}

#[tokio::test]
async fn later_sessions_refine_earlier_states() {
    let generator = PageStateGenerator::new("incremental");
    for id in ["i1", "i2"] {
        let mut rec = Recording::new(id);
        let last = rec.list_page(&["1"]);
        rec.append_items(10, last, &["2", "3"]);
        rec.register(&generator, "grown");
    }
    generator.evaluate().await.unwrap();
    assert!(generator
        .state("grown")
        .unwrap()
        .assertion(FRAME, LIST_ITEMS)
        .is_some());

    let mut late = Recording::new("i3");
    let last = late.list_page(&["1"]);
    late.append_items(10, last, &["2"]);
    late.register(&generator, "grown");
    generator.evaluate().await.unwrap();

    let state = generator.state("grown").unwrap();
    assert_eq!(state.session_ids.len(), 3);
    assert!(state.assertion(FRAME, LIST_ITEMS).is_none());
}

#[tokio::test]
async fn unknown_tabs_surface_store_errors() {
    let generator = PageStateGenerator::new("broken");
    let rec = Recording::new("broken");
    generator.add_session(rec.id.clone(), rec.store.clone(), TabId(9), window());
    generator.add_state("anything", rec.id.clone());

    let err = generator.evaluate().await.unwrap_err();
    assert!(matches!(err, PageStateError::Store(_)));
}

#[tokio::test]
async fn exported_states_restore_into_an_equivalent_generator() {
    let generator = PageStateGenerator::new("persisted");
    let mut sessions = Vec::new();
    for id in ["p1", "p2"] {
        let mut rec = Recording::new(id);
        let last = rec.list_page(&["1"]);
        rec.append_items(10, last, &["2"]);
        rec.register(&generator, "saved");
        sessions.push(rec);
    }
    generator.evaluate().await.unwrap();

    let snapshot = generator.export_states();
    let json = serde_json::to_string(&snapshot).unwrap();
    let decoded: PageStateSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, snapshot);

    let restored = PageStateGenerator::restore(decoded);
    assert_eq!(restored.id(), "persisted");
    assert_eq!(restored.state("saved"), generator.state("saved"));

    for rec in &sessions {
        restored.add_session(rec.id.clone(), rec.store.clone(), TAB, window());
    }
    restored.evaluate().await.unwrap();
    assert_eq!(restored.state("saved"), generator.state("saved"));
}
