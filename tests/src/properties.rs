use std::collections::{BTreeSet, HashMap};

use kanon_generalize::{Catalogue, GeneralizationRule};
use kanon_group::group_records;
use kanon_metrics::{audit_closeness, k_anonymity, l_diversity};
use kanon_pipeline::suppress_by_l;
use kanon_record::{Record, Value};
use proptest::prelude::*;

use crate::names;

fn row(a: u8, b: u8, s: u8) -> Record {
    Record::from_pairs([
        ("a", Value::from(format!("a{a}"))),
        ("b", Value::Int(i64::from(b))),
        ("s", Value::from(format!("s{s}"))),
    ])
}

fn dataset() -> impl Strategy<Value = Vec<Record>> {
    proptest::collection::vec((0u8..4, 0u8..3, 0u8..4), 1..60)
        .prop_map(|rows| rows.into_iter().map(|(a, b, s)| row(a, b, s)).collect())
}

fn qi_set() -> impl Strategy<Value = Vec<String>> {
    prop_oneof![
        Just(Vec::new()),
        Just(names(&["a"])),
        Just(names(&["b"])),
        Just(names(&["a", "b"])),
    ]
}

fn brute_force_sizes(records: &[Record], qi: &[String]) -> HashMap<Vec<String>, usize> {
    let mut sizes = HashMap::new();
    for r in records {
        let key: Vec<String> = qi
            .iter()
            .filter_map(|q| r.get(q).map(|v| v.grouping_text()))
            .collect();
        *sizes.entry(key).or_insert(0) += 1;
    }
    sizes
}

proptest! {
    /// Grouping partitions the input exactly
    #[test]
    fn group_sizes_sum_to_record_count(records in dataset(), qi in qi_set()) {
        let groups = group_records(&records, &qi).unwrap();
        prop_assert_eq!(groups.total_records(), records.len());
        if qi.is_empty() {
            prop_assert_eq!(groups.len(), 1);
        }
    }

    /// k is the smallest group size found by brute force
    #[test]
    fn k_matches_brute_force(records in dataset(), qi in qi_set()) {
        let groups = group_records(&records, &qi).unwrap();
        let k = k_anonymity(&groups).unwrap();
        let sizes = brute_force_sizes(&records, &qi);
        let smallest = sizes.values().copied().min().unwrap_or(0);
        prop_assert!(k.k >= 1);
        prop_assert_eq!(k.k, smallest);
        let singletons = sizes.values().filter(|&&n| n == 1).count();
        prop_assert_eq!(k.singleton_count, singletons);
    }

    /// l never exceeds the group size or the dataset-wide value count
    #[test]
    fn l_is_bounded(records in dataset(), qi in qi_set()) {
        let groups = group_records(&records, &qi).unwrap();
        let diversity = l_diversity(&groups, "s").unwrap();
        let distinct: BTreeSet<String> = records
            .iter()
            .filter_map(|r| r.get("s").map(|v| v.grouping_text()))
            .collect();
        for g in &diversity.per_group {
            prop_assert!(g.l >= 1);
            prop_assert!(g.l <= g.size.min(distinct.len()));
        }
        let min_l = diversity.per_group.iter().map(|g| g.l).min().unwrap_or(0);
        prop_assert_eq!(diversity.dataset_l, min_l);
    }

    /// t stays in [0, 1] and the single-group dataset is perfectly close
    #[test]
    fn t_is_bounded(records in dataset(), qi in qi_set()) {
        let groups = group_records(&records, &qi).unwrap();
        let audit = audit_closeness(&groups, "s").unwrap();
        for t in audit.t_values() {
            prop_assert!((0.0..=1.0).contains(&t), "t out of range: {}", t);
        }
        prop_assert!(audit.mean_t <= audit.max_t + 1e-12);
        if groups.len() == 1 {
            prop_assert!(audit.max_t.abs() < 1e-12);
        }
    }

    /// Suppression removes exactly the groups below min_l
    #[test]
    fn suppression_guarantees_min_l(
        records in dataset(),
        qi in qi_set(),
        min_l in 1usize..5,
    ) {
        let groups = group_records(&records, &qi).unwrap();
        let diversity = l_diversity(&groups, "s").unwrap();
        let expected_kept: usize = diversity
            .per_group
            .iter()
            .filter(|g| g.l >= min_l)
            .map(|g| g.size)
            .sum();

        let report = suppress_by_l(&records, &qi, "s", min_l).unwrap();
        prop_assert_eq!(report.retained.len(), expected_kept);
        prop_assert_eq!(report.dropped_records, records.len() - expected_kept);
        let fraction = report.dropped_records as f64 / records.len() as f64;
        prop_assert!((report.drop_fraction - fraction).abs() < 1e-12);

        if !report.retained.is_empty() {
            let regrouped = group_records(&report.retained, &qi).unwrap();
            let after = l_diversity(&regrouped, "s").unwrap();
            prop_assert!(after.dataset_l >= min_l);
        }
    }

    /// Generalizing generalized output changes nothing
    #[test]
    fn reference_catalogue_is_idempotent(
        ages in proptest::collection::vec(0i64..110, 1..20),
        country in prop_oneof![Just("United-States"), Just("Mexico"), Just(" Cuba ")],
        marital in prop_oneof![Just("Married-civ-spouse"), Just("Divorced"), Just("Never-married")],
        race in prop_oneof![Just("White"), Just("Black"), Just("Other")],
    ) {
        let records: Vec<Record> = ages
            .iter()
            .map(|&age| crate::adult(age, "Female", race, country, marital, "<=50K"))
            .collect();
        let catalogue = Catalogue::reference();
        let once = catalogue.generalize(&records).unwrap();
        let twice = catalogue.generalize(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Each binary rule maps its own output to itself
    #[test]
    fn binary_rule_is_idempotent(text in "[A-Za-z -]{0,12}") {
        let rule = GeneralizationRule::equals("United-States", "US", "Non-US");
        let once = rule.apply("native-country", &Value::from(text.as_str())).unwrap();
        let twice = rule.apply("native-country", &once).unwrap();
        prop_assert_eq!(once, twice);
    }
}
