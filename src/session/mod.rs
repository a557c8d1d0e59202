pub mod manager;
pub mod transport;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use manager::{EventOutcome, SessionManager};
pub use transport::SessionTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    AwaitingPairing,
    Connected,
    Disconnected,
    AuthFailed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingPairing => write!(f, "awaiting pairing"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::AuthFailed => write!(f, "authentication failed"),
        }
    }
}

/// The logical connection to the messaging transport.
///
/// Mutated only through lifecycle events; a new pairing attempt supersedes it
/// with a fresh id rather than reusing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub status: SessionStatus,
    pub linked_phone_number: Option<String>,
    pub linked_client_name: Option<String>,
    /// QR/pairing payload while awaiting pairing.
    pub pairing_payload: Option<String>,
    /// Set when the transport dropped this session and will not resume it;
    /// only a new `request_connection` brings the link back.
    #[serde(default)]
    pub reconnect_required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(status: SessionStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status,
            linked_phone_number: None,
            linked_client_name: None,
            pairing_payload: None,
            reconnect_required: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// Apply an event to this session. Returns `false` when the event is not
    /// accepted from the current status, leaving the session untouched.
    fn apply(&mut self, event: &LifecycleEvent) -> bool {
        match (self.status, event) {
            (SessionStatus::AwaitingPairing, LifecycleEvent::PairingCodeIssued { payload }) => {
                self.pairing_payload = Some(payload.clone());
            }
            (
                SessionStatus::AwaitingPairing,
                LifecycleEvent::Ready {
                    phone_number,
                    client_name,
                },
            ) => {
                self.status = SessionStatus::Connected;
                self.linked_phone_number.clone_from(phone_number);
                self.linked_client_name.clone_from(client_name);
                self.pairing_payload = None;
            }
            (SessionStatus::AwaitingPairing, LifecycleEvent::AuthenticationFailed { .. }) => {
                self.status = SessionStatus::AuthFailed;
                self.pairing_payload = None;
            }
            (
                SessionStatus::Connected,
                LifecycleEvent::Disconnected {
                    requires_reconnection,
                    ..
                },
            ) => {
                self.status = SessionStatus::Disconnected;
                self.reconnect_required = *requires_reconnection;
            }
            _ => return false,
        }
        self.updated_at = Utc::now();
        true
    }
}

/// Session lifecycle notifications delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    PairingCodeIssued {
        payload: String,
    },
    Ready {
        phone_number: Option<String>,
        client_name: Option<String>,
    },
    Disconnected {
        reason: String,
        /// The transport will not resume on its own; a new pairing is needed.
        requires_reconnection: bool,
    },
    AuthenticationFailed {
        reason: String,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PairingCodeIssued { .. } => "PairingCodeIssued",
            Self::Ready { .. } => "Ready",
            Self::Disconnected { .. } => "Disconnected",
            Self::AuthenticationFailed { .. } => "AuthenticationFailed",
        }
    }
}

/// A lifecycle event addressed to a specific session id.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: Uuid,
    pub event: LifecycleEvent,
}

impl SessionEvent {
    pub fn new(session_id: Uuid, event: LifecycleEvent) -> Self {
        Self { session_id, event }
    }
}
