//! Fixtures shared by the cross-crate scenario and property tests.
use kanon_record::{Record, Value};

/// A record in the reference attribute layout.
pub fn adult(
    age: i64,
    sex: &str,
    race: &str,
    country: &str,
    marital: &str,
    income: &str,
) -> Record {
    Record::from_pairs([
        ("age", Value::Int(age)),
        ("marital-status", Value::from(marital)),
        ("race", Value::from(race)),
        ("sex", Value::from(sex)),
        ("native-country", Value::from(country)),
        ("income", Value::from(income)),
    ])
}

/// A two-attribute record: quasi-identifier `q` and sensitive `s`.
pub fn qs(q: &str, s: &str) -> Record {
    Record::from_pairs([("q", Value::from(q)), ("s", Value::from(s))])
}

pub fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
mod properties;
#[cfg(test)]
mod scenarios;
