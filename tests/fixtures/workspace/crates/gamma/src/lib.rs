//! Fixture lint crate `gamma`.

pub const NAME: &str = "gamma";
