use anyhow::Result;
use async_trait::async_trait;

/// Result of delivering one text to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Phone number or group reference the outcome belongs to.
    pub recipient: String,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            error: None,
        }
    }

    pub fn failed(recipient: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// Outbound side of the messaging transport.
///
/// An `Err` from either method means the whole call failed and no target
/// received the text.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    /// Send `text` to every number, returning one outcome per number.
    async fn send_to_numbers(
        &self,
        phone_numbers: &[String],
        text: &str,
    ) -> Result<Vec<DeliveryOutcome>>;

    /// Post `text` into a group chat identified by its transport reference.
    async fn send_to_group(&self, group_ref: &str, text: &str) -> Result<DeliveryOutcome>;
}
