//! Quasi-identifier grouping.
//!
//! Records whose quasi-identifier values are equal (as trimmed text, in
//! quasi-identifier order) form one [`Group`]. Every metric in the engine is
//! computed from a [`Groups`] table; tables are rebuilt whenever the record
//! set changes and never stored.
use std::collections::BTreeMap;
use std::fmt;

use kanon_record::{AnonError, Record};

/// The quasi-identifier tuple shared by every member of a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(pub Vec<String>);

impl GroupKey {
    pub fn values(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// All records sharing one quasi-identifier tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    key: GroupKey,
    members: Vec<&'a Record>,
    rows: Vec<usize>,
}

impl<'a> Group<'a> {
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Members in input order.
    pub fn members(&self) -> &[&'a Record] {
        &self.members
    }

    /// Input row index of every member.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Trimmed text of `attribute` for every member, in member order.
    /// A missing attribute is reported against the member's input row.
    pub fn values_of(&self, attribute: &str) -> Result<Vec<String>, AnonError> {
        self.members
            .iter()
            .zip(&self.rows)
            .map(|(r, row)| r.require(attribute, *row).map(|v| v.grouping_text()))
            .collect()
    }
}

/// Mapping from quasi-identifier tuple to group, iterated in key order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Groups<'a> {
    table: BTreeMap<GroupKey, Group<'a>>,
}

impl<'a> Groups<'a> {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&Group<'a>> {
        self.table.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group<'a>> {
        self.table.values()
    }

    /// Sum of group sizes; equals the number of grouped records.
    pub fn total_records(&self) -> usize {
        self.table.values().map(Group::size).sum()
    }

    /// First group (in key order) of minimum size: the most exposed profile.
    pub fn smallest(&self) -> Option<&Group<'a>> {
        self.table.values().min_by_key(|g| g.size())
    }

    /// Groups containing exactly one record.
    pub fn singletons(&self) -> impl Iterator<Item = &Group<'a>> {
        self.table.values().filter(|g| g.size() == 1)
    }

    fn insert(&mut self, key: GroupKey, row: usize, record: &'a Record) {
        let group = self.table.entry(key.clone()).or_insert_with(|| Group {
            key,
            members: Vec::new(),
            rows: Vec::new(),
        });
        group.members.push(record);
        group.rows.push(row);
    }
}

impl<'g, 'a> IntoIterator for &'g Groups<'a> {
    type Item = &'g Group<'a>;
    type IntoIter = std::collections::btree_map::Values<'g, GroupKey, Group<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.values()
    }
}

/// Partitions `records` by their values for `quasi_identifiers`.
///
/// An empty record set yields an empty table; an empty quasi-identifier list
/// yields a single group holding every record. Fails with
/// [`AnonError::MissingAttribute`] when a record lacks a quasi-identifier or
/// carries a non-numeric value where the first record's value for that
/// attribute is numeric, or the reverse.
pub fn group_records<'a>(
    records: &'a [Record],
    quasi_identifiers: &[String],
) -> Result<Groups<'a>, AnonError> {
    let numeric = expected_numeric(records, quasi_identifiers)?;
    let keys = extract_keys(records, quasi_identifiers, &numeric)?;

    let mut groups = Groups::default();
    for (row, (record, key)) in records.iter().zip(keys).enumerate() {
        groups.insert(key, row, record);
    }
    log::debug!(
        "grouped {} records into {} groups over {:?}",
        records.len(),
        groups.len(),
        quasi_identifiers
    );
    Ok(groups)
}

/// Whether each quasi-identifier is numeric, judged from the first record.
/// Integers, decimals and numeric text form one numeric class.
fn expected_numeric(
    records: &[Record],
    quasi_identifiers: &[String],
) -> Result<Vec<bool>, AnonError> {
    match records.first() {
        None => Ok(Vec::new()),
        Some(first) => quasi_identifiers
            .iter()
            .map(|qi| first.require(qi, 0).map(|v| v.is_numeric()))
            .collect(),
    }
}

fn key_of(
    row: usize,
    record: &Record,
    quasi_identifiers: &[String],
    numeric: &[bool],
) -> Result<GroupKey, AnonError> {
    let mut parts = Vec::with_capacity(quasi_identifiers.len());
    for (qi, expected) in quasi_identifiers.iter().zip(numeric) {
        let value = record.require(qi, row)?;
        if value.is_numeric() != *expected {
            return Err(AnonError::kind_mismatch(qi, row, value.kind()));
        }
        parts.push(value.grouping_text());
    }
    Ok(GroupKey(parts))
}

fn extract_keys(
    records: &[Record],
    quasi_identifiers: &[String],
    numeric: &[bool],
) -> Result<Vec<GroupKey>, AnonError> {
    #[cfg(feature = "parallel")]
    {
        parallel_keys(records, quasi_identifiers, numeric)
    }
    #[cfg(not(feature = "parallel"))]
    {
        sequential_keys(records, quasi_identifiers, numeric)
    }
}

#[cfg(any(test, not(feature = "parallel")))]
fn sequential_keys(
    records: &[Record],
    quasi_identifiers: &[String],
    numeric: &[bool],
) -> Result<Vec<GroupKey>, AnonError> {
    records
        .iter()
        .enumerate()
        .map(|(row, r)| key_of(row, r, quasi_identifiers, numeric))
        .collect()
}

// Keys are computed on the pool but collected in record order, and the first
// failing row wins, so the result never depends on scheduling.
#[cfg(feature = "parallel")]
fn parallel_keys(
    records: &[Record],
    quasi_identifiers: &[String],
    numeric: &[bool],
) -> Result<Vec<GroupKey>, AnonError> {
    use rayon::prelude::*;

    let results: Vec<Result<GroupKey, AnonError>> = records
        .par_iter()
        .enumerate()
        .map(|(row, r)| key_of(row, r, quasi_identifiers, numeric))
        .collect();
    results.into_iter().collect()
}
