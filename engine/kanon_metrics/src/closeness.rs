use std::collections::BTreeMap;
use std::fmt;

use kanon_group::{Group, Groups};
use kanon_record::AnonError;
use serde::Serialize;

/// Probability mass function over the observed sensitive values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitiveDistribution {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl SensitiveDistribution {
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut counts = BTreeMap::new();
        let mut total = 0;
        for v in values {
            *counts.entry(v).or_insert(0) += 1;
            total += 1;
        }
        Self { counts, total }
    }

    /// Distribution over every member of every group.
    pub fn global(groups: &Groups<'_>, sensitive: &str) -> Result<Self, AnonError> {
        let mut values = Vec::with_capacity(groups.total_records());
        for group in groups {
            values.extend(group.values_of(sensitive)?);
        }
        Ok(Self::from_values(values))
    }

    pub fn of_group(group: &Group<'_>, sensitive: &str) -> Result<Self, AnonError> {
        Ok(Self::from_values(group.values_of(sensitive)?))
    }

    /// Proportion of `value`; zero for values never observed.
    pub fn proportion(&self, value: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.counts.get(value).copied().unwrap_or(0) as f64 / self.total as f64
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Variational distance between `local` and `global`, over the value
/// universe of `global`. Values absent from `local` contribute their full
/// global proportion.
pub fn variational_distance(local: &SensitiveDistribution, global: &SensitiveDistribution) -> f64 {
    let sum: f64 = global
        .values()
        .map(|v| (local.proportion(v) - global.proportion(v)).abs())
        .sum();
    (0.5 * sum).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCloseness {
    pub key: Vec<String>,
    pub size: usize,
    pub t: f64,
}

/// t-closeness of every group against the global distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosenessAudit {
    pub global: SensitiveDistribution,
    pub per_group: Vec<GroupCloseness>,
    /// Worst-case disclosure risk.
    pub max_t: f64,
    /// Typical disclosure risk (unweighted mean over groups).
    pub mean_t: f64,
    pub total_records: usize,
}

impl ClosenessAudit {
    pub fn t_values(&self) -> Vec<f64> {
        self.per_group.iter().map(|g| g.t).collect()
    }
}

/// Computes per-group t values and their max and mean.
pub fn audit_closeness(groups: &Groups<'_>, sensitive: &str) -> Result<ClosenessAudit, AnonError> {
    if groups.is_empty() {
        return Err(AnonError::EmptyDataset);
    }
    let global = SensitiveDistribution::global(groups, sensitive)?;
    let mut per_group = Vec::with_capacity(groups.len());
    for group in groups {
        let local = SensitiveDistribution::of_group(group, sensitive)?;
        per_group.push(GroupCloseness {
            key: group.key().values().to_vec(),
            size: group.size(),
            t: variational_distance(&local, &global),
        });
    }
    let max_t = per_group.iter().map(|g| g.t).fold(0.0, f64::max);
    let mean_t = per_group.iter().map(|g| g.t).sum::<f64>() / per_group.len() as f64;
    log::debug!(
        "closeness over {} groups: max t = {max_t:.4}, mean t = {mean_t:.4}",
        per_group.len()
    );
    Ok(ClosenessAudit {
        global,
        per_group,
        max_t,
        mean_t,
        total_records: groups.total_records(),
    })
}

/// How costly enforcing a threshold by suppression would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// No group exceeds the threshold.
    AlreadyMet,
    /// Under 5% of records would be lost.
    Easy,
    /// Under 15% of records would be lost.
    Feasible,
    TooCostly,
}

impl Verdict {
    fn from_loss(loss_fraction: f64) -> Self {
        if loss_fraction == 0.0 {
            Verdict::AlreadyMet
        } else if loss_fraction < 0.05 {
            Verdict::Easy
        } else if loss_fraction < 0.15 {
            Verdict::Feasible
        } else {
            Verdict::TooCostly
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::AlreadyMet => "already met",
            Verdict::Easy => "easy",
            Verdict::Feasible => "feasible",
            Verdict::TooCostly => "too costly",
        };
        write!(f, "{s}")
    }
}

/// One line of the feasibility sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasibilityRow {
    pub threshold: f64,
    /// Groups whose t exceeds the threshold.
    pub violating_groups: usize,
    /// Records inside those groups.
    pub rows_to_drop: usize,
    /// `rows_to_drop` as a fraction of the audited dataset.
    pub loss_fraction: f64,
    pub verdict: Verdict,
}

/// What suppressing every group with `t > threshold` would cost, for each
/// candidate threshold. Advisory only; nothing is removed.
pub fn feasibility_sweep(audit: &ClosenessAudit, thresholds: &[f64]) -> Vec<FeasibilityRow> {
    thresholds
        .iter()
        .map(|&threshold| {
            let violators = audit.per_group.iter().filter(|g| g.t > threshold);
            let (violating_groups, rows_to_drop) =
                violators.fold((0, 0), |(n, rows), g| (n + 1, rows + g.size));
            let loss_fraction = if audit.total_records == 0 {
                0.0
            } else {
                rows_to_drop as f64 / audit.total_records as f64
            };
            FeasibilityRow {
                threshold,
                violating_groups,
                rows_to_drop,
                loss_fraction,
                verdict: Verdict::from_loss(loss_fraction),
            }
        })
        .collect()
}

/// The last threshold whose enforcement is cheap, if any.
pub fn recommend_threshold(rows: &[FeasibilityRow]) -> Option<f64> {
    rows.iter()
        .filter(|r| r.verdict == Verdict::Easy)
        .map(|r| r.threshold)
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use kanon_group::group_records;
    use kanon_record::{Record, Value};

    fn rec(q: &str, s: &str) -> Record {
        Record::from_pairs([("q", Value::from(q)), ("s", Value::from(s))])
    }

    fn q() -> Vec<String> {
        vec!["q".to_string()]
    }

    #[test]
    fn matching_distribution_has_zero_t() {
        let records = vec![rec("g", "<=50K"), rec("g", ">50K"), rec("g", "<=50K")];
        let groups = group_records(&records, &q()).unwrap();
        let audit = audit_closeness(&groups, "s").unwrap();
        assert_abs_diff_eq!(audit.global.proportion("<=50K"), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(audit.max_t, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn singleton_against_mixed_global() {
        let records = vec![
            rec("a", "A"),
            rec("b", "A"),
            rec("b", "A"),
            rec("b", "B"),
            rec("b", "B"),
        ];
        let groups = group_records(&records, &q()).unwrap();
        let audit = audit_closeness(&groups, "s").unwrap();
        let t: Vec<f64> = audit.t_values();
        assert_abs_diff_eq!(t[0], 0.4, epsilon = 1e-12);
        // 0.5 * (|0.5 - 0.6| + |0.5 - 0.4|)
        assert_abs_diff_eq!(t[1], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(audit.max_t, 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(audit.mean_t, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn distance_uses_global_value_universe() {
        let local = SensitiveDistribution::from_values(vec!["x".to_string()]);
        let global = SensitiveDistribution::from_values(vec!["y".to_string()]);
        // "x" is outside the universe; only "y" contributes.
        assert_abs_diff_eq!(variational_distance(&local, &global), 0.5, epsilon = 1e-12);
        let global = SensitiveDistribution::from_values(vec!["x".into(), "y".into()]);
        let local = SensitiveDistribution::from_values(vec!["y".into()]);
        assert_abs_diff_eq!(variational_distance(&local, &global), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn audit_of_nothing_fails() {
        let groups = group_records(&[], &q()).unwrap();
        assert_eq!(audit_closeness(&groups, "s"), Err(AnonError::EmptyDataset));
    }

    #[test]
    fn sweep_counts_violators_and_loss() {
        let records = vec![
            rec("a", "A"),
            rec("b", "A"),
            rec("b", "A"),
            rec("b", "B"),
            rec("b", "B"),
        ];
        let groups = group_records(&records, &q()).unwrap();
        let audit = audit_closeness(&groups, "s").unwrap();
        let rows = feasibility_sweep(&audit, &[0.05, 0.2, 0.5]);

        assert_eq!(rows[0].violating_groups, 2);
        assert_eq!(rows[0].rows_to_drop, 5);
        assert_eq!(rows[0].verdict, Verdict::TooCostly);

        assert_eq!(rows[1].violating_groups, 1);
        assert_eq!(rows[1].rows_to_drop, 1);
        assert_abs_diff_eq!(rows[1].loss_fraction, 0.2, epsilon = 1e-12);

        assert_eq!(rows[2].violating_groups, 0);
        assert_eq!(rows[2].verdict, Verdict::AlreadyMet);
        assert_eq!(recommend_threshold(&rows), None);
    }

    #[test]
    fn recommendation_is_last_easy_threshold() {
        let row = |threshold, loss: f64| FeasibilityRow {
            threshold,
            violating_groups: 1,
            rows_to_drop: 1,
            loss_fraction: loss,
            verdict: Verdict::from_loss(loss),
        };
        let rows = vec![row(0.15, 0.2), row(0.2, 0.04), row(0.25, 0.01), row(0.3, 0.0)];
        assert_eq!(rows[3].verdict, Verdict::AlreadyMet);
        assert_eq!(recommend_threshold(&rows), Some(0.25));
    }
}
