use kanon_generalize::Catalogue;
use kanon_record::{AnonError, AttributeRoles};
use serde::{Deserialize, Serialize};

fn default_min_l() -> usize {
    2
}

fn default_thresholds() -> Vec<f64> {
    vec![0.15, 0.20, 0.25, 0.30]
}

/// Everything a pipeline run needs besides the records themselves.
///
/// Loaded from TOML; see [`PipelineConfig::reference`] for the defaults
/// used on the reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub quasi_identifiers: Vec<String>,
    pub sensitive_attribute: String,

    /// Groups with fewer distinct sensitive values are suppressed.
    #[serde(default = "default_min_l")]
    pub min_l: usize,

    /// When set, groups smaller than this are suppressed after the
    /// l-diversity pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_k: Option<usize>,

    /// Candidate t thresholds for the feasibility sweep, ascending.
    #[serde(default = "default_thresholds")]
    pub closeness_thresholds: Vec<f64>,

    /// Measure k after every individual generalization rule.
    #[serde(default)]
    pub trace_steps: bool,

    #[serde(default)]
    pub rules: Catalogue,
}

impl PipelineConfig {
    pub fn reference() -> Self {
        let roles = AttributeRoles::reference();
        Self {
            quasi_identifiers: roles.quasi_identifiers().to_vec(),
            sensitive_attribute: roles.sensitive().to_string(),
            min_l: default_min_l(),
            min_k: None,
            closeness_thresholds: default_thresholds(),
            trace_steps: true,
            rules: Catalogue::reference(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, AnonError> {
        toml::from_str(text).map_err(|e| AnonError::configuration(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, AnonError> {
        toml::to_string_pretty(self).map_err(|e| AnonError::configuration(e.to_string()))
    }

    /// Checks the configuration and returns the attribute roles it defines.
    pub fn validate(&self) -> Result<AttributeRoles, AnonError> {
        let roles = AttributeRoles::new(self.quasi_identifiers.clone(), &self.sensitive_attribute)?;
        if self.min_l < 1 {
            return Err(AnonError::configuration("min_l must be at least 1"));
        }
        if self.min_k == Some(0) {
            return Err(AnonError::configuration("min_k must be at least 1"));
        }
        if let Some(t) = self
            .closeness_thresholds
            .iter()
            .find(|t| !(0.0..=1.0).contains(*t))
        {
            return Err(AnonError::configuration(format!(
                "closeness threshold {t} is outside [0, 1]"
            )));
        }
        if self.closeness_thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnonError::configuration(
                "closeness thresholds must be strictly ascending",
            ));
        }
        if self.rules.get(&self.sensitive_attribute).is_some() {
            return Err(AnonError::configuration(format!(
                "sensitive attribute '{}' must not be generalized",
                self.sensitive_attribute
            )));
        }
        self.rules.validate()?;
        for rule in self.rules.rules() {
            if !roles.quasi_identifiers().contains(&rule.attribute) {
                log::warn!(
                    "generalization rule for '{}' targets a non quasi-identifier",
                    rule.attribute
                );
            }
        }
        Ok(roles)
    }
}
