// Shared test helpers; not all items used by every test binary.
#![allow(unused)]

use async_trait::async_trait;
use bulletin::address_book::{AddressBook, NewContact};
use bulletin::config::DispatchConfig;
use bulletin::dispatch::{BulkTransport, DeliveryOutcome, DispatchEngine};
use bulletin::session::{LifecycleEvent, SessionEvent, SessionManager, SessionTransport};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Session transport that pairs immediately: it issues a pairing code and
/// then reports `Ready` through the manager's event channel.
#[derive(Default)]
pub struct InstantPairing {
    events: Mutex<Option<(Uuid, mpsc::Sender<SessionEvent>)>>,
    pub teardowns: Mutex<Vec<Uuid>>,
}

impl InstantPairing {
    /// Report a disconnect for the session that was last paired.
    pub async fn drop_connection(&self, reason: &str) {
        let target = self.events.lock().unwrap().clone();
        if let Some((session_id, tx)) = target {
            tx.send(SessionEvent::new(
                session_id,
                LifecycleEvent::Disconnected {
                    reason: reason.to_string(),
                    requires_reconnection: false,
                },
            ))
            .await
            .unwrap();
        }
    }
}

#[async_trait]
impl SessionTransport for InstantPairing {
    async fn begin_pairing(
        &self,
        session_id: Uuid,
        events: mpsc::Sender<SessionEvent>,
    ) -> anyhow::Result<()> {
        *self.events.lock().unwrap() = Some((session_id, events.clone()));
        events
            .send(SessionEvent::new(
                session_id,
                LifecycleEvent::PairingCodeIssued {
                    payload: "2@pairing-payload".to_string(),
                },
            ))
            .await?;
        events
            .send(SessionEvent::new(
                session_id,
                LifecycleEvent::Ready {
                    phone_number: Some("+15550100".to_string()),
                    client_name: Some("Bulletin".to_string()),
                },
            ))
            .await?;
        Ok(())
    }

    async fn teardown(&self, session_id: Uuid) -> anyhow::Result<()> {
        self.teardowns.lock().unwrap().push(session_id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipients: Vec<String>,
    pub text: String,
}

/// Bulk transport that records every call and fails chosen numbers.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<SentMessage>>,
    pub unreachable: HashSet<String>,
    /// Session to drop while the first call is in flight.
    pub drop_after_first: Option<Arc<InstantPairing>>,
}

impl RecordingTransport {
    pub fn unreachable(numbers: &[&str]) -> Self {
        Self {
            unreachable: numbers.iter().map(|n| (*n).to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BulkTransport for RecordingTransport {
    async fn send_to_numbers(
        &self,
        phone_numbers: &[String],
        text: &str,
    ) -> anyhow::Result<Vec<DeliveryOutcome>> {
        let first = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(SentMessage {
                recipients: phone_numbers.to_vec(),
                text: text.to_string(),
            });
            sent.len() == 1
        };
        if first && let Some(pairing) = &self.drop_after_first {
            pairing.drop_connection("phone went offline").await;
        }
        Ok(phone_numbers
            .iter()
            .map(|n| {
                if self.unreachable.contains(n) {
                    DeliveryOutcome::failed(n.clone(), "number is not on WhatsApp")
                } else {
                    DeliveryOutcome::delivered(n.clone())
                }
            })
            .collect())
    }

    async fn send_to_group(&self, group_ref: &str, text: &str) -> anyhow::Result<DeliveryOutcome> {
        self.sent.lock().unwrap().push(SentMessage {
            recipients: vec![group_ref.to_string()],
            text: text.to_string(),
        });
        Ok(DeliveryOutcome::delivered(group_ref))
    }
}

/// A session manager with a running event loop, already connected.
pub async fn connected_session(pairing: Arc<InstantPairing>) -> Arc<SessionManager> {
    let session = Arc::new(SessionManager::new(pairing));
    session.spawn_event_loop().expect("event loop already taken");
    let mut state_rx = session.subscribe();
    session.request_connection().await.unwrap();
    state_rx
        .wait_for(bulletin::session::Session::is_connected)
        .await
        .unwrap();
    session
}

/// Address book with two contacts, returning their ids.
pub fn address_book_with(contacts: &[(&str, &str)]) -> (Arc<AddressBook>, Vec<String>) {
    let book = AddressBook::in_memory("admin").unwrap();
    let ids = contacts
        .iter()
        .map(|(name, phone)| book.add_contact(NewContact::new(*name, *phone)).unwrap().id)
        .collect();
    (Arc::new(book), ids)
}

pub fn engine(
    session: Arc<SessionManager>,
    book: Arc<AddressBook>,
    transport: Arc<RecordingTransport>,
    config: DispatchConfig,
) -> DispatchEngine {
    DispatchEngine::new(session, book, transport, config)
}
