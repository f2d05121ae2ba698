use std::fmt;

use kanon_record::{AnonError, Value};
use serde::{Deserialize, Serialize};

/// How a [`GeneralizationRule::Binary`] rule tests the trimmed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    Equals,
    StartsWith,
}

impl Matcher {
    fn matches(self, text: &str, pattern: &str) -> bool {
        match self {
            Matcher::Equals => text == pattern,
            Matcher::StartsWith => text.starts_with(pattern),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneralizationRule {
    /// Numeric binning. A value below `edges[0]` gets `labels[0]`, a value in
    /// `[edges[i-1], edges[i])` gets `labels[i]`, and anything at or above the
    /// last edge gets the last label.
    Bands { edges: Vec<f64>, labels: Vec<String> },
    /// Two-way split on the trimmed text.
    Binary {
        matcher: Matcher,
        pattern: String,
        matched: String,
        unmatched: String,
    },
    /// Replaces every value with `sentinel`.
    ConstantMask { sentinel: String },
    /// Keeps the first `keep` characters and appends `*` (e.g. `37 -> 3*`).
    PrefixMask { keep: usize },
}

impl GeneralizationRule {
    /// The reference four-way age binning.
    pub fn age_bands() -> Self {
        GeneralizationRule::Bands {
            edges: vec![30.0, 50.0, 70.0],
            labels: ["<30", "30-49", "50-69", "70+"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn equals(pattern: &str, matched: &str, unmatched: &str) -> Self {
        GeneralizationRule::Binary {
            matcher: Matcher::Equals,
            pattern: pattern.to_string(),
            matched: matched.to_string(),
            unmatched: unmatched.to_string(),
        }
    }

    pub fn starts_with(pattern: &str, matched: &str, unmatched: &str) -> Self {
        GeneralizationRule::Binary {
            matcher: Matcher::StartsWith,
            pattern: pattern.to_string(),
            matched: matched.to_string(),
            unmatched: unmatched.to_string(),
        }
    }

    pub fn mask(sentinel: &str) -> Self {
        GeneralizationRule::ConstantMask {
            sentinel: sentinel.to_string(),
        }
    }

    /// Texts this rule can write into a record.
    fn outputs(&self) -> Vec<&str> {
        match self {
            GeneralizationRule::Bands { labels, .. } => labels.iter().map(String::as_str).collect(),
            GeneralizationRule::Binary {
                matched, unmatched, ..
            } => vec![matched.as_str(), unmatched.as_str()],
            GeneralizationRule::ConstantMask { sentinel } => vec![sentinel.as_str()],
            GeneralizationRule::PrefixMask { .. } => Vec::new(),
        }
    }

    /// Checks the rule's own parameters.
    ///
    /// Output texts must survive a round trip through a comma-delimited
    /// file: no commas, no line breaks, no surrounding whitespace.
    pub fn validate(&self) -> Result<(), String> {
        for out in self.outputs() {
            if out.contains([',', '\n', '\r']) || out.trim() != out {
                return Err(format!("output '{out}' cannot be written as a field"));
            }
        }
        match self {
            GeneralizationRule::Bands { edges, labels } => {
                if edges.is_empty() {
                    return Err("bands need at least one edge".into());
                }
                if edges.iter().any(|e| !e.is_finite()) {
                    return Err("band edges must be finite".into());
                }
                if edges.windows(2).any(|w| w[0] >= w[1]) {
                    return Err("band edges must be strictly ascending".into());
                }
                if labels.len() != edges.len() + 1 {
                    return Err(format!(
                        "{} band edges need {} labels, got {}",
                        edges.len(),
                        edges.len() + 1,
                        labels.len()
                    ));
                }
                Ok(())
            }
            GeneralizationRule::Binary {
                pattern,
                matched,
                unmatched,
                ..
            } => {
                if pattern.trim().is_empty() {
                    return Err("binary rule pattern is empty".into());
                }
                if matched == unmatched {
                    return Err("binary rule outputs must differ".into());
                }
                Ok(())
            }
            GeneralizationRule::ConstantMask { .. } => Ok(()),
            GeneralizationRule::PrefixMask { keep } => {
                if *keep == 0 {
                    Err("prefix mask must keep at least one character".into())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Generalizes one value of `attribute`.
    ///
    /// Values already in the rule's output range are returned unchanged.
    /// Fails with [`AnonError::InvalidValue`] outside the rule's domain:
    /// non-numeric input to `Bands`, empty input to `PrefixMask`.
    pub fn apply(&self, attribute: &str, value: &Value) -> Result<Value, AnonError> {
        let text = value.grouping_text();
        match self {
            GeneralizationRule::Bands { edges, labels } => {
                if labels.iter().any(|l| *l == text) {
                    return Ok(Value::Text(text));
                }
                let n = value
                    .as_number()
                    .ok_or_else(|| AnonError::invalid_value(attribute, value))?;
                let idx = edges.iter().take_while(|edge| n >= **edge).count();
                let label = labels.get(idx).ok_or_else(|| {
                    AnonError::configuration(format!(
                        "'{attribute}' bands have no label for band {idx}"
                    ))
                })?;
                Ok(Value::Text(label.clone()))
            }
            GeneralizationRule::Binary {
                matcher,
                pattern,
                matched,
                unmatched,
            } => {
                if text == *matched || text == *unmatched {
                    return Ok(Value::Text(text));
                }
                let out = if matcher.matches(&text, pattern) {
                    matched
                } else {
                    unmatched
                };
                Ok(Value::Text(out.clone()))
            }
            GeneralizationRule::ConstantMask { sentinel } => Ok(Value::Text(sentinel.clone())),
            GeneralizationRule::PrefixMask { keep } => {
                if text.is_empty() {
                    return Err(AnonError::invalid_value(attribute, value));
                }
                if text.ends_with('*') && text.chars().count() <= keep + 1 {
                    return Ok(Value::Text(text));
                }
                let prefix: String = text.chars().take(*keep).collect();
                Ok(Value::Text(format!("{prefix}*")))
            }
        }
    }
}

impl fmt::Display for GeneralizationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneralizationRule::Bands { labels, .. } => write!(f, "bands [{}]", labels.join(", ")),
            GeneralizationRule::Binary {
                matched, unmatched, ..
            } => write!(f, "{matched} vs {unmatched}"),
            GeneralizationRule::ConstantMask { sentinel } => write!(f, "mask as {sentinel}"),
            GeneralizationRule::PrefixMask { keep } => write!(f, "keep {keep} leading"),
        }
    }
}
