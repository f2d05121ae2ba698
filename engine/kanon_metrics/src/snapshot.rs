use std::collections::BTreeMap;

use kanon_group::group_records;
use kanon_record::{AnonError, Record};
use serde::Serialize;

use crate::{audit_closeness, k_anonymity, l_diversity, l_histogram};

/// t statistics carried by a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosenessSummary {
    pub max_t: f64,
    pub mean_t: f64,
    pub per_group_t: Vec<f64>,
}

/// Metrics of one record set, handed to reporting and plotting consumers.
///
/// An empty record set is measured as `k = 0`, `l_min = 0` with no
/// closeness summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub stage: String,
    pub record_count: usize,
    pub group_count: usize,
    pub k: usize,
    pub singleton_count: usize,
    pub l_min: usize,
    /// l value -> number of groups.
    pub l_distribution: BTreeMap<usize, usize>,
    /// l of every group, in group key order.
    pub per_group_l: Vec<usize>,
    pub closeness: Option<ClosenessSummary>,
    pub drop_count: usize,
    pub drop_fraction: f64,
}

impl MetricsSnapshot {
    pub fn measure(
        stage: &str,
        records: &[Record],
        quasi_identifiers: &[String],
        sensitive: &str,
    ) -> Result<Self, AnonError> {
        let groups = group_records(records, quasi_identifiers)?;
        if groups.is_empty() {
            return Ok(Self {
                stage: stage.to_string(),
                record_count: 0,
                group_count: 0,
                k: 0,
                singleton_count: 0,
                l_min: 0,
                l_distribution: BTreeMap::new(),
                per_group_l: Vec::new(),
                closeness: None,
                drop_count: 0,
                drop_fraction: 0.0,
            });
        }

        let k = k_anonymity(&groups)?;
        let diversity = l_diversity(&groups, sensitive)?;
        let audit = audit_closeness(&groups, sensitive)?;
        log::debug!(
            "{stage}: {} records, {} groups, k = {}, l = {}",
            records.len(),
            groups.len(),
            k.k,
            diversity.dataset_l
        );

        Ok(Self {
            stage: stage.to_string(),
            record_count: records.len(),
            group_count: groups.len(),
            k: k.k,
            singleton_count: k.singleton_count,
            l_min: diversity.dataset_l,
            l_distribution: l_histogram(&diversity),
            per_group_l: diversity.per_group.iter().map(|g| g.l).collect(),
            closeness: Some(ClosenessSummary {
                max_t: audit.max_t,
                mean_t: audit.mean_t,
                per_group_t: audit.t_values(),
            }),
            drop_count: 0,
            drop_fraction: 0.0,
        })
    }

    /// Records the data loss of the stage that produced this record set.
    pub fn with_drop(mut self, drop_count: usize, drop_fraction: f64) -> Self {
        self.drop_count = drop_count;
        self.drop_fraction = drop_fraction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanon_record::Value;
    use pretty_assertions::assert_eq;

    fn rec(q: &str, s: &str) -> Record {
        Record::from_pairs([("q", Value::from(q)), ("s", Value::from(s))])
    }

    #[test]
    fn measures_all_metrics() {
        let records = vec![rec("a", "A"), rec("b", "A"), rec("b", "B")];
        let snap = MetricsSnapshot::measure("raw", &records, &["q".to_string()], "s").unwrap();
        assert_eq!(snap.k, 1);
        assert_eq!(snap.singleton_count, 1);
        assert_eq!(snap.per_group_l, vec![1, 2]);
        assert_eq!(snap.l_distribution, BTreeMap::from([(1, 1), (2, 1)]));
        assert_eq!(snap.closeness.as_ref().map(|c| c.per_group_t.len()), Some(2));
    }

    #[test]
    fn empty_record_set_measures_as_zero() {
        let snap = MetricsSnapshot::measure("final", &[], &["q".to_string()], "s")
            .unwrap()
            .with_drop(4, 1.0);
        assert_eq!(snap.k, 0);
        assert_eq!(snap.l_min, 0);
        assert!(snap.closeness.is_none());
        assert_eq!(snap.drop_count, 4);
    }

    #[test]
    fn serializes_for_reporting() {
        let records = vec![rec("a", "A")];
        let snap = MetricsSnapshot::measure("raw", &records, &["q".to_string()], "s").unwrap();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["k"], 1);
        assert_eq!(json["stage"], "raw");
    }
}
