use crate::errors::{BulletinError, BulletinResult};
use crate::session::{LifecycleEvent, Session, SessionEvent, SessionStatus, SessionTransport};
use anyhow::Context;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const MAX_SESSION_HISTORY: usize = 32;

/// Result of feeding one lifecycle event to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied {
        status: SessionStatus,
        /// Set for `Disconnected { requires_reconnection: true }`: the transport
        /// will not resume on its own.
        reconnect_required: bool,
    },
    /// The event names a superseded session id and was dropped.
    Stale,
    /// Not a valid transition from the current status; no-op.
    Ignored { status: SessionStatus },
}

/// Owns the single active messaging session.
///
/// State lives in a `watch` channel so that other components (the dispatch
/// engine in particular) can observe transitions while they run.
pub struct SessionManager {
    transport: Arc<dyn SessionTransport>,
    state_tx: watch::Sender<Session>,
    history: std::sync::Mutex<VecDeque<Session>>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: std::sync::Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    /// Serializes connect/disconnect requests.
    lifecycle: Mutex<()>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn SessionTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            state_tx: watch::Sender::new(Session::new(SessionStatus::Disconnected)),
            history: std::sync::Mutex::new(VecDeque::new()),
            events_tx,
            events_rx: std::sync::Mutex::new(Some(events_rx)),
            lifecycle: Mutex::new(()),
        }
    }

    /// Read-only snapshot of the active session.
    pub fn current_state(&self) -> Session {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state_tx.subscribe()
    }

    /// Sender handed to transports for delivering lifecycle events.
    pub fn event_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Superseded sessions, oldest first.
    pub fn history(&self) -> Vec<Session> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Start a new pairing attempt, superseding the current session.
    pub async fn request_connection(&self) -> BulletinResult<Uuid> {
        let _guard = self.lifecycle.lock().await;

        if self.state_tx.borrow().is_connected() {
            return Err(BulletinError::AlreadyConnected);
        }

        let session = Session::new(SessionStatus::AwaitingPairing);
        let session_id = session.id;
        let previous = self.state_tx.send_replace(session);
        self.push_history(previous);
        info!("session {} awaiting pairing", session_id);

        if let Err(e) = self
            .transport
            .begin_pairing(session_id, self.events_tx.clone())
            .await
        {
            warn!("transport failed to begin pairing for {}: {}", session_id, e);
            self.state_tx.send_if_modified(|s| {
                if s.id == session_id && s.status == SessionStatus::AwaitingPairing {
                    s.status = SessionStatus::Disconnected;
                    s.updated_at = chrono::Utc::now();
                    true
                } else {
                    false
                }
            });
            return Err(BulletinError::Internal(
                e.context("failed to begin pairing"),
            ));
        }

        Ok(session_id)
    }

    /// Apply one lifecycle event to the active session.
    pub fn on_lifecycle_event(&self, envelope: SessionEvent) -> EventOutcome {
        let mut outcome = EventOutcome::Stale;
        self.state_tx.send_if_modified(|session| {
            if session.id != envelope.session_id {
                return false;
            }
            if session.apply(&envelope.event) {
                outcome = EventOutcome::Applied {
                    status: session.status,
                    reconnect_required: session.reconnect_required,
                };
                true
            } else {
                outcome = EventOutcome::Ignored {
                    status: session.status,
                };
                false
            }
        });

        match &outcome {
            EventOutcome::Applied {
                status,
                reconnect_required,
            } => {
                info!(
                    "session {} -> {} ({})",
                    envelope.session_id,
                    status,
                    envelope.event.name()
                );
                if *reconnect_required {
                    warn!(
                        "session {} disconnected and will not auto-resume; request a new connection",
                        envelope.session_id
                    );
                }
                if let LifecycleEvent::Disconnected { reason, .. }
                | LifecycleEvent::AuthenticationFailed { reason } = &envelope.event
                {
                    info!("session {} reason: {}", envelope.session_id, reason);
                }
            }
            EventOutcome::Stale => {
                debug!(
                    "dropping {} for superseded session {}",
                    envelope.event.name(),
                    envelope.session_id
                );
            }
            EventOutcome::Ignored { status } => {
                debug!(
                    "ignoring {} for session {} in state {}",
                    envelope.event.name(),
                    envelope.session_id,
                    status
                );
            }
        }
        outcome
    }

    /// Tear down a connected session.
    pub async fn disconnect(&self) -> BulletinResult<()> {
        let _guard = self.lifecycle.lock().await;

        let session_id = {
            let session = self.state_tx.borrow();
            if !session.is_connected() {
                return Err(BulletinError::NotConnected);
            }
            session.id
        };

        self.transport
            .teardown(session_id)
            .await
            .context("transport teardown failed")?;

        // The transport may already have reported the disconnect; then this is a no-op.
        self.on_lifecycle_event(SessionEvent::new(
            session_id,
            LifecycleEvent::Disconnected {
                reason: "disconnected by operator".to_string(),
                requires_reconnection: false,
            },
        ));
        Ok(())
    }

    /// Consume transport events in arrival order on a background task.
    ///
    /// Returns `None` if the loop was already started.
    pub fn spawn_event_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self.events_rx.lock().ok()?.take()?;
        let manager = Arc::clone(self);
        Some(tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                manager.on_lifecycle_event(envelope);
            }
            debug!("session event stream closed");
        }))
    }

    fn push_history(&self, session: Session) {
        if let Ok(mut history) = self.history.lock() {
            history.push_back(session);
            while history.len() > MAX_SESSION_HISTORY {
                history.pop_front();
            }
        }
    }
}
