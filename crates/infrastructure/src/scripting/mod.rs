//! The request scripting DSL: parser and sandbox.

mod parser;
mod sandbox;

pub use parser::{parse_script, ParseError};
pub use sandbox::DslSandbox;
