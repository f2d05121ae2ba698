//! Attribute generalization.
//!
//! A [`Catalogue`] holds one [`AttributeRule`] per attribute. Each rule is a
//! total, deterministic map from raw value to a coarser category, touches
//! only its own attribute, and leaves values already in its output range
//! unchanged.
mod catalogue;
mod rule;

pub use catalogue::*;
pub use rule::*;
