use crate::session::SessionEvent;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// The pairing side of the external messaging transport.
///
/// Implementations report lifecycle changes by sending `SessionEvent`s tagged
/// with the `session_id` they were started for.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Start pairing for `session_id`. Returns once pairing has been requested;
    /// progress arrives later on `events`.
    async fn begin_pairing(
        &self,
        session_id: Uuid,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<()>;

    /// Tear down the transport connection for `session_id`.
    async fn teardown(&self, session_id: Uuid) -> Result<()>;
}
