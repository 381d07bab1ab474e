use async_trait::async_trait;

use super::OutboundMessage;
use crate::PublishError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError>;

    /// Whether the broker session is currently up
    fn is_connected(&self) -> bool;
}
