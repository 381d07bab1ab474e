mod rate;
mod scheduler;

pub use rate::RateWindow;
pub use scheduler::{AcquisitionScheduler, SchedulerSettings};
