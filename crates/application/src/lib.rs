//! Quiver Application - The request execution pipeline
//!
//! Orchestrates runs of the pipeline: scope resolution, placeholder
//! interpolation, sandboxed scripts, transport dispatch, response
//! parsing, assertions, timings, and the observable response store.
//! External effects (HTTP, script sandboxing) sit behind ports
//! implemented in the infrastructure layer.

pub mod cancel;
pub mod executor;
pub mod interpolate;
pub mod ports;
pub mod scope;
pub mod store;
pub mod timing;

pub use cancel::{CancellationRegistry, RunHandle};
pub use executor::{DEFAULT_SCRIPT_TIMEOUT_MS, EngineConfig, ExecutionEngine};
pub use interpolate::{Interpolated, Interpolator};
pub use ports::{Clock, ScriptEngine, ScriptInvocation, TestRunner, Transport, TransportError};
pub use scope::ScopeResolver;
pub use store::{DEFAULT_HISTORY_CAPACITY, ResponseStore, StoreEvent};
pub use timing::TimingRecorder;
