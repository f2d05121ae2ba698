use crate::AnonError;

/// Attribute roles for one analysis run: the quasi-identifier set and the
/// sensitive attribute.
///
/// Changing the quasi-identifiers invalidates every grouping computed so far,
/// so the roles are fixed once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRoles {
    quasi_identifiers: Vec<String>,
    sensitive: String,
}

impl AttributeRoles {
    /// Validates and builds the roles.
    ///
    /// Fails with [`AnonError::Configuration`] when the quasi-identifier list
    /// is empty, contains a duplicate, or contains the sensitive attribute.
    pub fn new<I, S>(quasi_identifiers: I, sensitive: &str) -> Result<Self, AnonError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let quasi_identifiers: Vec<String> =
            quasi_identifiers.into_iter().map(Into::into).collect();
        if quasi_identifiers.is_empty() {
            return Err(AnonError::configuration("quasi-identifier list is empty"));
        }
        for (i, qi) in quasi_identifiers.iter().enumerate() {
            if quasi_identifiers[..i].contains(qi) {
                return Err(AnonError::configuration(format!(
                    "quasi-identifier '{qi}' is listed twice"
                )));
            }
        }
        if quasi_identifiers.iter().any(|qi| qi == sensitive) {
            return Err(AnonError::configuration(format!(
                "sensitive attribute '{sensitive}' is also a quasi-identifier"
            )));
        }
        Ok(Self {
            quasi_identifiers,
            sensitive: sensitive.to_string(),
        })
    }

    /// The reference roles: age, sex, race, native-country and
    /// marital-status identify; income is sensitive.
    pub fn reference() -> Self {
        Self {
            quasi_identifiers: ["age", "sex", "race", "native-country", "marital-status"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sensitive: "income".to_string(),
        }
    }

    pub fn quasi_identifiers(&self) -> &[String] {
        &self.quasi_identifiers
    }

    pub fn sensitive(&self) -> &str {
        &self.sensitive
    }
}
