use approx::assert_abs_diff_eq;
use kanon_group::group_records;
use kanon_metrics::{
    audit_closeness, feasibility_sweep, k_anonymity, l_diversity, recommend_threshold,
    SensitiveDistribution, Verdict,
};
use kanon_pipeline::{Pipeline, PipelineConfig, Stage};
use kanon_record::{AnonError, AttributeRoles};
use pretty_assertions::assert_eq;

use crate::{adult, names, qs};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn one_generalized_group_with_matching_distribution() {
    let records = vec![
        qs("30-49|Person|White|US|Married", "<=50K"),
        qs("30-49|Person|White|US|Married", ">50K"),
        qs("30-49|Person|White|US|Married", "<=50K"),
    ];
    let qi = names(&["q"]);
    let groups = group_records(&records, &qi).unwrap();
    assert_eq!(groups.len(), 1);

    let k = k_anonymity(&groups).unwrap();
    assert_eq!((k.k, k.singleton_count), (3, 0));
    assert_eq!(l_diversity(&groups, "s").unwrap().dataset_l, 2);

    let global = SensitiveDistribution::global(&groups, "s").unwrap();
    assert_abs_diff_eq!(global.proportion("<=50K"), 2.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(global.proportion(">50K"), 1.0 / 3.0, epsilon = 1e-12);
    let audit = audit_closeness(&groups, "s").unwrap();
    assert_abs_diff_eq!(audit.max_t, 0.0, epsilon = 1e-12);
}

#[test]
fn reference_pipeline_reaches_the_same_group() {
    init();
    let records = vec![
        adult(31, "Male", "White", "United-States", "Married-civ-spouse", "<=50K"),
        adult(38, "Female", "White", "United-States", "Married-AF-spouse", ">50K"),
        adult(49, "Male", "White", "United-States", "Married-civ-spouse", "<=50K"),
    ];
    let outcome = Pipeline::new(PipelineConfig::reference())
        .unwrap()
        .run(records)
        .unwrap();
    assert_eq!(outcome.final_metrics.k, 3);
    assert_eq!(outcome.final_metrics.l_min, 2);
    assert_eq!(outcome.final_metrics.drop_count, 0);
    let audit = outcome.closeness.unwrap();
    assert_eq!(
        audit.per_group[0].key,
        names(&["30-49", "Person", "White", "US", "Married"])
    );
    assert_abs_diff_eq!(audit.max_t, 0.0, epsilon = 1e-12);
}

#[test]
fn single_record_is_fully_suppressed() {
    // the reference rules target attributes this dataset does not have
    let config = PipelineConfig {
        quasi_identifiers: names(&["q"]),
        sensitive_attribute: "s".to_string(),
        rules: Default::default(),
        ..PipelineConfig::reference()
    };
    let outcome = Pipeline::new(config).unwrap().run(vec![qs("x", "A")]).unwrap();
    assert_eq!((outcome.raw.k, outcome.raw.l_min), (1, 1));
    assert!(outcome.final_records.is_empty());
    assert_abs_diff_eq!(outcome.final_metrics.drop_fraction, 1.0);
    assert!(outcome.closeness.is_none());
    // nothing survives to measure after suppression
    let labels: Vec<&str> = outcome.progress.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["raw"]);
}

#[test]
fn singleton_and_mixed_group_closeness() {
    let records = vec![
        qs("solo", "A"),
        qs("four", "A"),
        qs("four", "A"),
        qs("four", "B"),
        qs("four", "B"),
    ];
    let groups = group_records(&records, &names(&["q"])).unwrap();
    let global = SensitiveDistribution::global(&groups, "s").unwrap();
    assert_abs_diff_eq!(global.proportion("A"), 0.6, epsilon = 1e-12);
    assert_abs_diff_eq!(global.proportion("B"), 0.4, epsilon = 1e-12);

    let audit = audit_closeness(&groups, "s").unwrap();
    let solo = audit
        .per_group
        .iter()
        .find(|g| g.key == names(&["solo"]))
        .unwrap();
    assert_abs_diff_eq!(solo.t, 0.4, epsilon = 1e-12);
    let k = k_anonymity(&groups).unwrap();
    assert_eq!((k.k, k.singleton_count), (1, 1));

    let rows = feasibility_sweep(&audit, &[0.05, 0.5]);
    assert_eq!(rows[0].rows_to_drop, 5);
    assert_eq!(rows[0].verdict, Verdict::TooCostly);
    assert_eq!(rows[1].verdict, Verdict::AlreadyMet);
    assert_eq!(recommend_threshold(&rows), None);
}

#[test]
fn sensitive_attribute_inside_quasi_identifiers_is_rejected() {
    let err = AttributeRoles::new(names(&["age", "income"]), "income").unwrap_err();
    assert!(matches!(err, AnonError::Configuration(_)));

    let config = PipelineConfig {
        sensitive_attribute: "age".to_string(),
        ..PipelineConfig::reference()
    };
    let err = Pipeline::new(config).unwrap_err();
    assert_eq!(err.stage, Stage::Configure);
}

#[test]
fn unknown_race_value_still_generalizes() {
    let records = vec![
        adult(52, "Female", "Asian-Pac-Islander", "India", "Never-married", ">50K"),
        adult(67, "Male", "Amer-Indian-Eskimo", "Canada", "Divorced", "<=50K"),
    ];
    let outcome = Pipeline::new(PipelineConfig::reference())
        .unwrap()
        .run(records)
        .unwrap();
    let keys: Vec<_> = outcome
        .closeness
        .iter()
        .flat_map(|a| a.per_group.iter().map(|g| g.key.clone()))
        .collect();
    assert_eq!(keys, vec![names(&["50-69", "Person", "Other", "Non-US", "Single"])]);
}
