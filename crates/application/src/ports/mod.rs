//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the execution pipeline and
//! external systems. Each port is a trait implemented by an adapter in
//! the infrastructure layer, which keeps the pipeline testable with
//! in-memory fakes.

mod clock;
mod script_engine;
mod test_runner;
mod transport;

pub use clock::Clock;
pub use script_engine::{ScriptEngine, ScriptInvocation};
pub use test_runner::TestRunner;
pub use transport::{Transport, TransportError};
