use thiserror::Error;

use crate::ValueKind;

/// Errors raised by the grouping, metric, transform and suppression stages.
///
/// None of these are transient; re-running with the same input reproduces
/// them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnonError {
    #[error("no records to group")]
    EmptyDataset,
    #[error("{}", describe_missing(attribute, *row, found))]
    MissingAttribute {
        attribute: String,
        row: usize,
        /// `None` when the attribute is absent, otherwise the unexpected kind found.
        found: Option<ValueKind>,
    },
    #[error("value '{value}' is outside the domain of the '{attribute}' rule")]
    InvalidValue { attribute: String, value: String },
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AnonError {
    pub fn missing_attribute(attribute: &str, row: usize) -> Self {
        AnonError::MissingAttribute {
            attribute: attribute.to_string(),
            row,
            found: None,
        }
    }

    pub fn kind_mismatch(attribute: &str, row: usize, found: ValueKind) -> Self {
        AnonError::MissingAttribute {
            attribute: attribute.to_string(),
            row,
            found: Some(found),
        }
    }

    pub fn invalid_value(attribute: &str, value: impl ToString) -> Self {
        AnonError::InvalidValue {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AnonError::Configuration(msg.into())
    }
}

fn describe_missing(attribute: &str, row: usize, found: &Option<ValueKind>) -> String {
    match found {
        None => format!("record {row} has no attribute '{attribute}'"),
        Some(kind) => format!(
            "record {row} has attribute '{attribute}' of unexpected kind {kind}"
        ),
    }
}
