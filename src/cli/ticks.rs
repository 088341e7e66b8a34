use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tick_timeline::{
    SessionTicks, Tick, TickTimeline, TickTimelineService, TicksRequest, TimelinePolicyHandle,
};
use timetravel_session_store::InMemorySessionStore;
use tracing::info;

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct TicksArgs {
    /// Recorded session file (JSON)
    #[arg(long, value_name = "FILE")]
    pub session: PathBuf,

    /// Attach mouse, focus and scroll records to each tab
    #[arg(long)]
    pub include_interactions: bool,

    /// Attach the tab's commands
    #[arg(long)]
    pub include_commands: bool,

    /// Attach the tab's paint commits
    #[arg(long)]
    pub include_paint_events: bool,

    /// Write a JSONL export to this file instead of printing ticks
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Largest single export line, in bytes
    #[arg(long)]
    pub max_payload_bytes: Option<usize>,
}

impl TicksArgs {
    /// Flags left unset fall back to the configured defaults.
    pub fn request(&self) -> TicksRequest {
        TicksRequest {
            include_interaction_events: self.include_interactions.then_some(true),
            include_commands: self.include_commands.then_some(true),
            include_paint_events: self.include_paint_events.then_some(true),
        }
    }
}

pub async fn cmd_ticks(args: TicksArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let store = InMemorySessionStore::load_json(&args.session)
        .await
        .with_context(|| format!("failed to load session {}", args.session.display()))?;

    let mut view = ctx.config().timeline.clone();
    if let Some(path) = &args.export {
        view.log_enable = true;
        view.log_path = path.to_string_lossy().to_string();
    }
    if let Some(max_payload_bytes) = args.max_payload_bytes {
        view.max_payload_bytes = max_payload_bytes;
    }
    let (service, _) =
        TickTimelineService::with_store_and_policy(store, TimelinePolicyHandle::new_with(view));

    if args.export.is_some() {
        let result = service
            .export(args.request())
            .await
            .context("tick export failed")?;
        if let Some(path) = result.path {
            println!("Tick export written to {path}");
        }
        println!(
            "Tick stats → tabs={} ticks={} failed_tabs={} skipped_detaches={}",
            result.stats.total_tabs,
            result.stats.total_ticks,
            result.stats.failed_tabs,
            result.stats.skipped_detaches
        );
        return Ok(());
    }

    let ticks = service
        .session_ticks(args.request())
        .await
        .context("tick build failed")?;
    info!(
        session = %ticks.session_id,
        tabs = ticks.tab_details.len(),
        ticks = ticks.total_ticks(),
        "session ticks built"
    );
    match format.render(&ticks.tab_details)? {
        Some(rendered) => println!("{rendered}"),
        None => print!("{}", render_ticks_human(&ticks)?),
    }
    Ok(())
}

pub fn render_ticks_human(ticks: &SessionTicks) -> Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "Session {}: {} tabs, {} ticks",
        ticks.session_id,
        ticks.tab_details.len(),
        ticks.total_ticks()
    )?;
    for details in &ticks.tab_details {
        let tab = &details.tab;
        match tab.detached_from_tab_id {
            Some(parent) => writeln!(
                out,
                "Tab {} (detached from {}) starting at {}",
                tab.id, parent, tab.start_url
            )?,
            None => writeln!(out, "Tab {} starting at {}", tab.id, tab.start_url)?,
        }
        for tick in &details.ticks {
            writeln!(out, "  {}", tick_line(tick))?;
        }
    }
    for failure in &ticks.report.failed_tabs {
        writeln!(out, "Tab {} failed: {}", failure.tab_id, failure.error)?;
    }
    for skipped in &ticks.report.skipped_detaches {
        writeln!(out, "Skipped detach: {skipped}")?;
    }
    Ok(out)
}

fn tick_line(tick: &Tick) -> String {
    let offset = tick
        .timeline_offset_percent
        .map(|offset| format!("{offset:>7.3}%"))
        .unwrap_or_else(|| "      -%".to_string());
    let mut line = format!(
        "{offset} {:<7} #{:<3} {}",
        tick.event_type.as_str(),
        tick.event_type_index,
        tick.document_url
    );
    if let Some(label) = &tick.label {
        line.push_str(&format!(" [{label}]"));
    }
    if tick.is_major {
        line.push_str(" major");
    }
    if tick.is_new_document_tick {
        line.push_str(" new-document");
    }
    line
}
