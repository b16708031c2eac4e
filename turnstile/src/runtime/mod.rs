/// Builder for constructing queue engines.
pub mod builder;
/// Background sweeper and shutdown handling.
pub mod supervisor;

pub use builder::QueueEngineBuilder;
pub use supervisor::{QueueRuntime, ShutdownToken};
