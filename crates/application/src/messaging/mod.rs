pub mod command_listener;
mod outbox;

pub use command_listener::{CommandListener, CommandSource};
pub use outbox::Outbox;
