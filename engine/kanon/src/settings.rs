use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use kanon_pipeline::PipelineConfig;
use kanon_record::{AnonError, REFERENCE_COLUMNS};
use serde::{Deserialize, Serialize};

fn reference_columns() -> Vec<String> {
    REFERENCE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// The `kanon.toml` layout: input column names plus the pipeline
/// configuration, all at top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Names of the input file's columns, in file order.
    #[serde(default = "reference_columns")]
    pub columns: Vec<String>,

    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            columns: reference_columns(),
            pipeline: PipelineConfig::reference(),
        }
    }
}

impl Settings {
    /// Reads `path` when given, otherwise the reference settings.
    pub fn load(path: Option<&Path>) -> Result<Self, AnonError> {
        let settings = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    AnonError::configuration(format!("cannot read '{}': {e}", path.display()))
                })?;
                log::debug!("loaded settings from {}", path.display());
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, AnonError> {
        toml::from_str(text).map_err(|e| AnonError::configuration(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, AnonError> {
        toml::to_string_pretty(self).map_err(|e| AnonError::configuration(e.to_string()))
    }

    /// Validates the pipeline configuration and checks that every attribute
    /// it names is one of the input columns.
    pub fn validate(&self) -> Result<(), AnonError> {
        let roles = self.pipeline.validate()?;
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(AnonError::configuration(format!(
                    "column '{column}' is listed twice"
                )));
            }
        }
        let named = roles
            .quasi_identifiers()
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(roles.sensitive()));
        for attribute in named {
            if !seen.contains(attribute) {
                return Err(AnonError::configuration(format!(
                    "attribute '{attribute}' is not an input column"
                )));
            }
        }
        Ok(())
    }
}
