//! Analyses behind `assess` and `audit`, and the plain-text rendering of
//! every report the driver prints.
use std::fmt::Write as _;

use kanon_group::group_records;
use kanon_metrics::{
    audit_closeness, feasibility_sweep, recommend_threshold, ClosenessAudit, FeasibilityRow,
    MetricsSnapshot,
};
use kanon_pipeline::{PipelineConfig, PipelineOutcome};
use kanon_record::{AnonError, Record};
use serde::Serialize;

/// The most exposed profile in a record set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VulnerableGroup {
    pub key: Vec<String>,
    pub size: usize,
    /// 0-based input row of the group's first member.
    pub row: usize,
    pub record: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessReport {
    pub metrics: MetricsSnapshot,
    pub vulnerable: Option<VulnerableGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub metrics: MetricsSnapshot,
    pub closeness: ClosenessAudit,
    pub feasibility: Vec<FeasibilityRow>,
    pub recommended_threshold: Option<f64>,
}

pub fn assess(records: &[Record], config: &PipelineConfig) -> Result<AssessReport, AnonError> {
    if records.is_empty() {
        return Err(AnonError::EmptyDataset);
    }
    let qi = &config.quasi_identifiers;
    let metrics = MetricsSnapshot::measure("raw", records, qi, &config.sensitive_attribute)?;
    let groups = group_records(records, qi)?;
    let vulnerable = groups.smallest().and_then(|group| {
        let (row, first) = group.rows().iter().zip(group.members()).next()?;
        Some(VulnerableGroup {
            key: group.key().values().to_vec(),
            size: group.size(),
            row: *row,
            record: first
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        })
    });
    Ok(AssessReport {
        metrics,
        vulnerable,
    })
}

pub fn audit(records: &[Record], config: &PipelineConfig) -> Result<AuditReport, AnonError> {
    if records.is_empty() {
        return Err(AnonError::EmptyDataset);
    }
    let qi = &config.quasi_identifiers;
    let sensitive = &config.sensitive_attribute;
    let metrics = MetricsSnapshot::measure("audit", records, qi, sensitive)?;
    let groups = group_records(records, qi)?;
    let closeness = audit_closeness(&groups, sensitive)?;
    let feasibility = feasibility_sweep(&closeness, &config.closeness_thresholds);
    let recommended_threshold = recommend_threshold(&feasibility);
    Ok(AuditReport {
        metrics,
        closeness,
        feasibility,
        recommended_threshold,
    })
}

fn push_snapshot(out: &mut String, snapshot: &MetricsSnapshot) {
    let _ = writeln!(
        out,
        "[{}] records: {}, groups: {}, k = {}, unique profiles: {}, l = {}",
        snapshot.stage,
        snapshot.record_count,
        snapshot.group_count,
        snapshot.k,
        snapshot.singleton_count,
        snapshot.l_min
    );
    if let Some(t) = &snapshot.closeness {
        let _ = writeln!(out, "    t: max {:.4}, mean {:.4}", t.max_t, t.mean_t);
    }
    if snapshot.drop_count > 0 {
        let _ = writeln!(
            out,
            "    dropped {} records ({:.2}%)",
            snapshot.drop_count,
            snapshot.drop_fraction * 100.0
        );
    }
}

fn push_feasibility(out: &mut String, rows: &[FeasibilityRow], recommended: Option<f64>) {
    if rows.is_empty() {
        return;
    }
    let _ = writeln!(out, "threshold  groups  rows  loss     verdict");
    for row in rows {
        let _ = writeln!(
            out,
            "{:<9.2}  {:>6}  {:>4}  {:>6.2}%  {}",
            row.threshold,
            row.violating_groups,
            row.rows_to_drop,
            row.loss_fraction * 100.0,
            row.verdict
        );
    }
    match recommended {
        Some(t) => {
            let _ = writeln!(out, "recommended t threshold: {t:.2}");
        }
        None => {
            let _ = writeln!(out, "no cheap threshold: maintain current state");
        }
    }
}

pub fn render_assess(report: &AssessReport) -> String {
    let mut out = String::new();
    push_snapshot(&mut out, &report.metrics);
    if let Some(v) = &report.vulnerable {
        let _ = writeln!(
            out,
            "most exposed profile ({} record(s), first at row {}): ({})",
            v.size,
            v.row + 1,
            v.key.join(", ")
        );
    }
    out
}

pub fn render_audit(report: &AuditReport) -> String {
    let mut out = String::new();
    push_snapshot(&mut out, &report.metrics);
    push_feasibility(&mut out, &report.feasibility, report.recommended_threshold);
    out
}

pub fn render_outcome(outcome: &PipelineOutcome) -> String {
    let mut out = String::new();
    for point in &outcome.progress {
        let _ = writeln!(
            out,
            "step {:<16} k = {:<5} unique profiles: {}",
            point.label, point.k, point.singleton_count
        );
    }
    push_snapshot(&mut out, &outcome.raw);
    push_snapshot(&mut out, &outcome.generalized);
    if !outcome.generalization_progressed {
        let _ = writeln!(out, "    warning: generalization did not reduce risk");
    }
    push_snapshot(&mut out, &outcome.final_metrics);
    push_feasibility(
        &mut out,
        &outcome.feasibility,
        outcome.recommended_threshold,
    );
    out
}
