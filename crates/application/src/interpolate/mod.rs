//! `{{placeholder}}` parsing and substitution.

pub mod engine;
pub mod parser;

pub use engine::{Interpolated, Interpolator, MAX_DEPTH};
pub use parser::{has_placeholders, parse_placeholders, PlaceholderRef};
