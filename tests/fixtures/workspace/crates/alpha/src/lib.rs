//! Fixture lint crate `alpha`.

pub const NAME: &str = "alpha";
