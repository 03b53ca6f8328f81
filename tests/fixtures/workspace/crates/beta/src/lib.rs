//! Fixture lint crate `beta`.

pub const NAME: &str = "beta";
