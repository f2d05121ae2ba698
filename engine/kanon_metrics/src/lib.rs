//! Re-identification risk metrics computed over quasi-identifier groups.
mod closeness;
mod risk;
mod snapshot;

pub use closeness::*;
pub use risk::*;
pub use snapshot::*;
