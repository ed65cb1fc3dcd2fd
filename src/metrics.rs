use crate::common::time::format_utc;
use crate::probe::{FlowResult, ProbeResult};
use std::collections::BTreeMap;

/// The per-step values persisted for every flow run. Payloads are never
/// part of a row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Metric {
    StartTime,
    DurationSeconds,
    StatusCode,
    StatusText,
}

impl Metric {
    pub fn iter_all() -> &'static [Metric] {
        &[
            Metric::StartTime,
            Metric::DurationSeconds,
            Metric::StatusCode,
            Metric::StatusText,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::StartTime => "start_time",
            Metric::DurationSeconds => "duration_seconds",
            Metric::StatusCode => "status_code",
            Metric::StatusText => "status_text",
        }
    }

    pub fn render(self, result: &ProbeResult) -> String {
        match self {
            Metric::StartTime => format_utc(result.started_at),
            Metric::DurationSeconds => format!("{:.3}", result.duration_seconds()),
            Metric::StatusCode => result
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_default(),
            Metric::StatusText => result.status_text.clone(),
        }
    }
}

pub fn column_name(step: &str, metric: Metric) -> String {
    format!("{step}.{}", metric.label())
}

/// Flattens a flow into `step.metric` columns, sorted by column name.
pub fn flatten(flow: &FlowResult) -> BTreeMap<String, String> {
    let mut row = BTreeMap::new();
    for (step, result) in flow.iter() {
        for &metric in Metric::iter_all() {
            row.insert(column_name(step, metric), metric.render(result));
        }
    }
    row
}
