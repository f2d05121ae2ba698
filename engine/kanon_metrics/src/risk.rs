use std::collections::{BTreeMap, BTreeSet};

use kanon_group::{GroupKey, Groups};
use kanon_record::AnonError;
use serde::Serialize;

/// Result of a k-anonymity measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KAnonymity {
    /// Smallest group size.
    pub k: usize,
    /// Number of groups holding a single record.
    pub singleton_count: usize,
}

/// Minimum group size and number of singleton groups.
///
/// Every group must be fully assembled before the minimum is taken; a single
/// late group can set k.
pub fn k_anonymity(groups: &Groups<'_>) -> Result<KAnonymity, AnonError> {
    let k = groups
        .iter()
        .map(|g| g.size())
        .min()
        .ok_or(AnonError::EmptyDataset)?;
    let singleton_count = groups.singletons().count();
    Ok(KAnonymity { k, singleton_count })
}

/// Distinct sensitive values for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDiversity {
    pub key: GroupKey,
    pub size: usize,
    pub l: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LDiversity {
    /// Per-group l, in group key order.
    pub per_group: Vec<GroupDiversity>,
    /// Minimum l across groups.
    pub dataset_l: usize,
}

impl LDiversity {
    /// Whether every group has at least `min_l` distinct sensitive values.
    pub fn satisfies(&self, min_l: usize) -> bool {
        self.dataset_l >= min_l
    }
}

/// Counts distinct sensitive values per group.
pub fn l_diversity(groups: &Groups<'_>, sensitive: &str) -> Result<LDiversity, AnonError> {
    let mut per_group = Vec::with_capacity(groups.len());
    for group in groups {
        let distinct: BTreeSet<String> = group.values_of(sensitive)?.into_iter().collect();
        per_group.push(GroupDiversity {
            key: group.key().clone(),
            size: group.size(),
            l: distinct.len(),
        });
    }
    let dataset_l = per_group
        .iter()
        .map(|g| g.l)
        .min()
        .ok_or(AnonError::EmptyDataset)?;
    Ok(LDiversity {
        per_group,
        dataset_l,
    })
}

/// Number of groups at each l value.
pub fn l_histogram(diversity: &LDiversity) -> BTreeMap<usize, usize> {
    let mut hist = BTreeMap::new();
    for g in &diversity.per_group {
        *hist.entry(g.l).or_insert(0) += 1;
    }
    hist
}
