//! Quiver Infrastructure - Adapters for the execution pipeline ports
//!
//! Concrete implementations of the application-layer ports: the reqwest
//! transport, the script sandbox, the declarative assertion runner, and
//! the system clock.

pub mod clock;
mod compare;
pub mod http;
pub mod scripting;
pub mod testing;

pub use clock::SystemClock;
pub use http::ReqwestTransport;
pub use scripting::{DslSandbox, ParseError};
pub use testing::AssertionRunner;
