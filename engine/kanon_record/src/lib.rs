//! Record model for the kanon risk engine.
//!
//! A [`Record`] is one dataset row: an ordered list of named primitive
//! [`Value`]s. [`AttributeRoles`] designates which attributes act as
//! quasi-identifiers and which one is sensitive. Every fallible operation in
//! the engine reports an [`AnonError`].
pub mod error;
pub mod record;
pub mod roles;
pub mod value;

pub use error::*;
pub use record::*;
pub use roles::*;
pub use value::*;

/// Attribute names of the reference (UCI adult) dataset, in file order.
pub const REFERENCE_COLUMNS: [&str; 15] = [
    "age",
    "workclass",
    "fnlwgt",
    "education",
    "education-num",
    "marital-status",
    "occupation",
    "relationship",
    "race",
    "sex",
    "capital-gain",
    "capital-loss",
    "hours-per-week",
    "native-country",
    "income",
];
