//! Application layer - the node's acquisition-and-control plane

pub mod acquisition;
pub mod command;
pub mod messaging;
pub mod state;
pub mod telemetry;

pub use acquisition::{AcquisitionScheduler, SchedulerSettings};
pub use command::CommandDispatcher;
pub use messaging::{CommandListener, CommandSource, Outbox};
pub use state::{DeviceSnapshot, DeviceState, SharedDriver};
