use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::to_string;
use timetravel_core_types::{SessionId, TabId};

use crate::errors::TlError;
use crate::model::{ExportStats, SessionTicks, TabDetails};

pub const EXPORT_VERSION: u32 = 1;

/// One line of a tick export.
#[derive(Debug, Serialize)]
#[serde(tag = "line", rename_all = "snake_case")]
pub enum JsonlLine<'a> {
    Header {
        export_version: u32,
        generated_at: DateTime<Utc>,
        session_id: &'a SessionId,
    },
    Tab(&'a TabDetails),
    Failure {
        tab_id: TabId,
        error: String,
    },
    SkippedDetach {
        error: String,
    },
    Footer(ExportStats),
}

pub fn export_stats(ticks: &SessionTicks) -> ExportStats {
    ExportStats {
        total_tabs: ticks.tab_details.len(),
        total_ticks: ticks.total_ticks(),
        failed_tabs: ticks.report.failed_tabs.len(),
        skipped_detaches: ticks.report.skipped_detaches.len(),
    }
}

/// Header, one line per tab, failed tabs and skipped detaches, then the footer.
pub fn session_lines(ticks: &SessionTicks) -> Vec<JsonlLine<'_>> {
    let report = &ticks.report;
    let mut lines = Vec::with_capacity(
        ticks.tab_details.len() + report.failed_tabs.len() + report.skipped_detaches.len() + 2,
    );
    lines.push(JsonlLine::Header {
        export_version: EXPORT_VERSION,
        generated_at: Utc::now(),
        session_id: &ticks.session_id,
    });
    lines.extend(ticks.tab_details.iter().map(JsonlLine::Tab));
    lines.extend(report.failed_tabs.iter().map(|failure| JsonlLine::Failure {
        tab_id: failure.tab_id,
        error: failure.error.to_string(),
    }));
    lines.extend(
        report
            .skipped_detaches
            .iter()
            .map(|error| JsonlLine::SkippedDetach {
                error: error.to_string(),
            }),
    );
    lines.push(JsonlLine::Footer(export_stats(ticks)));
    lines
}

pub fn serialize_lines(
    lines: &[JsonlLine<'_>],
    max_payload_bytes: usize,
) -> Result<Vec<String>, TlError> {
    let mut serialized = Vec::with_capacity(lines.len());
    for line in lines {
        let json = to_string(line).map_err(|err| TlError::Internal(err.to_string()))?;
        if json.len() > max_payload_bytes {
            return Err(TlError::Oversize);
        }
        serialized.push(json);
    }
    Ok(serialized)
}

pub fn write_lines(base_path: &str, lines: &[String]) -> Result<String, TlError> {
    let path = Path::new(base_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(normalize(path))
}

fn normalize(path: &Path) -> String {
    path.components()
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}
