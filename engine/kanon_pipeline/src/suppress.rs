use kanon_group::{group_records, Group};
use kanon_record::{AnonError, Record};
use kanon_metrics::SensitiveDistribution;

/// Records retained by a suppression pass, with an exact account of what was
/// dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct SuppressionReport {
    /// Surviving records, in input order.
    pub retained: Vec<Record>,
    pub dropped_records: usize,
    pub dropped_groups: usize,
    /// `dropped_records` over the input size; zero for an empty input.
    pub drop_fraction: f64,
}

impl SuppressionReport {
    pub fn drop_percent(&self) -> f64 {
        self.drop_fraction * 100.0
    }
}

/// Removes every group with fewer than `min_l` distinct sensitive values.
///
/// l is computed on `records` as given, with the same grouping the metrics
/// use, so regrouping the retained set yields l >= `min_l` for every group.
pub fn suppress_by_l(
    records: &[Record],
    quasi_identifiers: &[String],
    sensitive: &str,
    min_l: usize,
) -> Result<SuppressionReport, AnonError> {
    if min_l < 1 {
        return Err(AnonError::configuration("min_l must be at least 1"));
    }
    let report = suppress_groups(records, quasi_identifiers, |group| {
        Ok(SensitiveDistribution::of_group(group, sensitive)?.distinct() >= min_l)
    })?;
    log::debug!(
        "l-suppression (min_l = {min_l}) dropped {} records in {} groups",
        report.dropped_records,
        report.dropped_groups
    );
    Ok(report)
}

/// Removes every group smaller than `min_k`.
pub fn suppress_by_k(
    records: &[Record],
    quasi_identifiers: &[String],
    min_k: usize,
) -> Result<SuppressionReport, AnonError> {
    if min_k < 1 {
        return Err(AnonError::configuration("min_k must be at least 1"));
    }
    let report = suppress_groups(records, quasi_identifiers, |group| Ok(group.size() >= min_k))?;
    log::debug!(
        "k-suppression (min_k = {min_k}) dropped {} records in {} groups",
        report.dropped_records,
        report.dropped_groups
    );
    Ok(report)
}

fn suppress_groups<F>(
    records: &[Record],
    quasi_identifiers: &[String],
    mut keep: F,
) -> Result<SuppressionReport, AnonError>
where
    F: FnMut(&Group<'_>) -> Result<bool, AnonError>,
{
    let groups = group_records(records, quasi_identifiers)?;
    let mut retain = vec![false; records.len()];
    let mut dropped_groups = 0;
    for group in &groups {
        if keep(group)? {
            for &row in group.rows() {
                retain[row] = true;
            }
        } else {
            dropped_groups += 1;
        }
    }

    let retained: Vec<Record> = records
        .iter()
        .zip(&retain)
        .filter(|(_, kept)| **kept)
        .map(|(r, _)| r.clone())
        .collect();
    let dropped_records = records.len() - retained.len();
    let drop_fraction = if records.is_empty() {
        0.0
    } else {
        dropped_records as f64 / records.len() as f64
    };
    Ok(SuppressionReport {
        retained,
        dropped_records,
        dropped_groups,
        drop_fraction,
    })
}
