mod ack;
mod parse;

pub use ack::{Acknowledgement, Outcome, RejectReason};
pub use parse::{Command, CommandParseError};
