//! Read-only views over a [`DeviceSnapshot`](crate::state::DeviceSnapshot):
//! push messages for the pub/sub channel and the pull metrics exposition.

mod exposition;
mod message;

pub use exposition::{CONTENT_TYPE, render_metrics};
pub use message::{
    ack_message, frame_message, reading_message, snapshot_message, status_message,
};
