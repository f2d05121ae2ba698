use std::fmt;

use kanon_record::{AnonError, Record};
use serde::{Deserialize, Serialize};

use crate::GeneralizationRule;

/// A rule bound to the attribute it rewrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRule {
    pub attribute: String,
    #[serde(flatten)]
    pub rule: GeneralizationRule,
}

impl AttributeRule {
    pub fn new(attribute: &str, rule: GeneralizationRule) -> Self {
        Self {
            attribute: attribute.to_string(),
            rule,
        }
    }

    /// Rewrites this rule's attribute in every record.
    pub fn apply_all(&self, records: &[Record]) -> Result<Vec<Record>, AnonError> {
        records
            .iter()
            .enumerate()
            .map(|(row, r)| self.apply_one(row, r))
            .collect()
    }

    fn apply_one(&self, row: usize, record: &Record) -> Result<Record, AnonError> {
        let raw = record.require(&self.attribute, row)?;
        let generalized = self.rule.apply(&self.attribute, raw)?;
        Ok(record.with_value(&self.attribute, generalized))
    }
}

impl fmt::Display for AttributeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attribute, self.rule)
    }
}

/// Ordered set of attribute rules, at most one per attribute.
///
/// Deserialization validates, so a loaded catalogue is always well formed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<AttributeRule>", into = "Vec<AttributeRule>")]
pub struct Catalogue {
    rules: Vec<AttributeRule>,
}

impl TryFrom<Vec<AttributeRule>> for Catalogue {
    type Error = AnonError;

    fn try_from(rules: Vec<AttributeRule>) -> Result<Self, Self::Error> {
        Catalogue::new(rules)
    }
}

impl From<Catalogue> for Vec<AttributeRule> {
    fn from(catalogue: Catalogue) -> Self {
        catalogue.rules
    }
}

impl Catalogue {
    pub fn new(rules: Vec<AttributeRule>) -> Result<Self, AnonError> {
        let catalogue = Self { rules };
        catalogue.validate()?;
        Ok(catalogue)
    }

    /// The reference catalogue: age binning, US/non-US country, married/single
    /// status, white/other race and a fully masked sex attribute.
    pub fn reference() -> Self {
        Self {
            rules: vec![
                AttributeRule::new("age", GeneralizationRule::age_bands()),
                AttributeRule::new(
                    "native-country",
                    GeneralizationRule::equals("United-States", "US", "Non-US"),
                ),
                AttributeRule::new(
                    "marital-status",
                    GeneralizationRule::starts_with("Married", "Married", "Single"),
                ),
                AttributeRule::new("race", GeneralizationRule::equals("White", "White", "Other")),
                AttributeRule::new("sex", GeneralizationRule::mask("Person")),
            ],
        }
    }

    /// Rejects duplicate attributes and malformed rules.
    pub fn validate(&self) -> Result<(), AnonError> {
        for (i, r) in self.rules.iter().enumerate() {
            if self.rules[..i].iter().any(|o| o.attribute == r.attribute) {
                return Err(AnonError::configuration(format!(
                    "attribute '{}' has more than one generalization rule",
                    r.attribute
                )));
            }
            r.rule.validate().map_err(|msg| {
                AnonError::configuration(format!("rule for '{}': {msg}", r.attribute))
            })?;
        }
        Ok(())
    }

    pub fn rules(&self) -> &[AttributeRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeRule> {
        self.rules.iter().find(|r| r.attribute == attribute)
    }

    /// Applies every rule to every record, producing a new record set.
    ///
    /// Any out-of-domain value aborts the whole transform; no partial output
    /// is returned.
    pub fn generalize(&self, records: &[Record]) -> Result<Vec<Record>, AnonError> {
        let out = records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                self.rules
                    .iter()
                    .try_fold(record.clone(), |acc, rule| rule.apply_one(row, &acc))
            })
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "generalized {} records with {} rules",
            out.len(),
            self.rules.len()
        );
        Ok(out)
    }

    /// Applies the rules one at a time, calling `on_step` with each
    /// intermediate record set. Returns the fully generalized set.
    pub fn apply_stepwise<F>(
        &self,
        records: &[Record],
        mut on_step: F,
    ) -> Result<Vec<Record>, AnonError>
    where
        F: FnMut(&AttributeRule, &[Record]) -> Result<(), AnonError>,
    {
        let mut current = records.to_vec();
        for rule in &self.rules {
            log::trace!("applying {rule}");
            current = rule.apply_all(&current)?;
            on_step(rule, &current)?;
        }
        Ok(current)
    }
}
