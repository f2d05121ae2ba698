use crate::{AnonError, Value};

/// One dataset row: attribute names mapped to values, in schema order.
///
/// Records are never mutated by the engine's stages; transforms build a new
/// record through [`Record::with_value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Builds a record from `(name, value)` pairs. A repeated name keeps the
    /// last value at the position of its first occurrence.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Record::new();
        for (k, v) in pairs {
            record.set(k.into(), v.into());
        }
        record
    }

    fn set(&mut self, name: String, value: Value) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Looks up `name`, reporting a missing attribute against row `row`.
    pub fn require(&self, name: &str, row: usize) -> Result<&Value, AnonError> {
        self.get(name)
            .ok_or_else(|| AnonError::missing_attribute(name, row))
    }

    /// Returns a copy of this record with `name` replaced by `value`.
    /// An unknown name is appended.
    pub fn with_value(&self, name: &str, value: Value) -> Record {
        let mut next = self.clone();
        next.set(name.to_string(), value);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
