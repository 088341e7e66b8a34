use std::collections::HashMap;

use timetravel_core_types::CommandId;
use timetravel_session_store::model::{
    FocusEventKind, FocusRecord, MouseEventKind, MouseEventRecord,
};

use crate::model::{HighlightNodes, Tick, TickEventType};

/// Per-tab lookups the forward pass consults while advancing.
pub struct TabLookups<'a> {
    pub command_highlights: HashMap<CommandId, HighlightNodes>,
    pub focus: &'a [FocusRecord],
    pub mouse: &'a [MouseEventRecord],
}

/// State carried forward across a tab's ordered ticks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CarriedContext {
    pub document_url: Option<String>,
    pub document_load_paint_index: Option<usize>,
    pub paint_event_index: Option<usize>,
    pub scroll_event_index: Option<usize>,
    pub mouse_event_index: Option<usize>,
    pub focus_event_index: Option<usize>,
    pub highlight: Option<HighlightNodes>,
}

impl CarriedContext {
    /// Context after observing `tick`.
    pub fn advance(&self, tick: &Tick, lookups: &TabLookups<'_>) -> CarriedContext {
        let mut next = if tick.is_new_document_tick {
            CarriedContext {
                document_url: Some(tick.document_url.clone()),
                document_load_paint_index: Some(tick.event_type_index),
                paint_event_index: Some(tick.event_type_index),
                ..CarriedContext::default()
            }
        } else {
            self.clone()
        };

        let index = tick.event_type_index;
        match tick.event_type {
            TickEventType::Command => {
                if let Some(highlight) = tick
                    .command_id
                    .and_then(|id| lookups.command_highlights.get(&id))
                {
                    next.highlight = Some(highlight.clone());
                }
            }
            TickEventType::Focus => {
                next.focus_event_index = Some(index);
                if let Some(event) = lookups.focus.get(index) {
                    match (event.event, event.target_node_id) {
                        (FocusEventKind::In, Some(node)) => {
                            next.highlight = Some(HighlightNodes {
                                frame_id: Some(event.frame_id),
                                node_ids: vec![node],
                            });
                        }
                        (FocusEventKind::Out, _) => next.highlight = None,
                        _ => {}
                    }
                }
            }
            TickEventType::Mouse => {
                next.mouse_event_index = Some(index);
                if let Some(event) = lookups.mouse.get(index) {
                    match (event.event, event.target_node_id) {
                        (MouseEventKind::Down, Some(node)) => {
                            next.highlight = Some(HighlightNodes {
                                frame_id: Some(event.frame_id),
                                node_ids: vec![node],
                            });
                        }
                        (MouseEventKind::Leave, _) => next.highlight = None,
                        _ => {}
                    }
                }
            }
            TickEventType::Paint => next.paint_event_index = Some(index),
            TickEventType::Scroll => next.scroll_event_index = Some(index),
            TickEventType::Init => {}
        }
        next
    }

    /// Copies the context onto `tick`.
    pub fn stamp(&self, mut tick: Tick, start_url: &str) -> Tick {
        tick.document_url = self
            .document_url
            .clone()
            .unwrap_or_else(|| start_url.to_string());
        tick.document_load_paint_index = self.document_load_paint_index;
        tick.paint_event_index = self.paint_event_index;
        tick.scroll_event_index = self.scroll_event_index;
        tick.mouse_event_index = self.mouse_event_index;
        tick.focus_event_index = self.focus_event_index;
        tick.highlight_node_ids = self.highlight.clone();

        if tick.event_type == TickEventType::Init || self.paint_event_index.is_none() {
            tick.document_url = start_url.to_string();
            tick.document_load_paint_index = None;
            tick.paint_event_index = None;
        }
        tick
    }
}

/// Threads a fresh context through ordered ticks, yielding one stamped tick per input.
pub fn carry_forward(ticks: Vec<Tick>, start_url: &str, lookups: &TabLookups<'_>) -> Vec<Tick> {
    ticks
        .into_iter()
        .scan(CarriedContext::default(), |context, tick| {
            *context = context.advance(&tick, lookups);
            Some(context.stamp(tick, start_url))
        })
        .collect()
}
