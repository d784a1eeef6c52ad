//! Output formatting

use serde::Serialize;

use crate::lifecycle::{BuildOutcome, CleanReport, RunOutcome, StatusReport};
use crate::output::human::format_human;
use crate::output::json::format_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// What a command produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Report {
    Build(BuildOutcome),
    Run(RunOutcome),
    Clean(CleanReport),
    Status(StatusReport),
}

pub fn format_output(report: &Report, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(report),
        OutputFormat::Json => format_json(report),
    }
}
