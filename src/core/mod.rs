//! Runtime core: supervised loops and the state they share.
//!
//! - [`supervised`]: one task repeated on an interval in its own execution context;
//! - [`guard`]: panic interception around iterations and scope-exit cleanup;
//! - [`alive`]: lock-free liveness timestamp;
//! - [`registry`]: running loops by name;
//! - [`watchdog`]: periodic timeout sweeps over the registry;
//! - [`supervisor`]: owner of registry, bus and subscribers; process-level teardown;
//! - [`shutdown`]: cross-platform termination signals.

mod alive;
mod builder;
mod guard;
mod registry;
mod shutdown;
mod supervised;
mod supervisor;
mod watchdog;

pub use alive::Heartbeat;
pub use builder::SupervisorBuilder;
pub use guard::FaultReport;
pub(crate) use guard::panic_message;
pub use registry::Registry;
pub use supervised::{LoopBuilder, LoopState, SupervisedLoop};
pub use supervisor::Supervisor;
pub use watchdog::{TimeoutReaction, Watchdog};
