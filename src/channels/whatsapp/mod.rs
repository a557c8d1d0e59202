//! WhatsApp linked-device transport over the `wa-rs` bot.
//!
//! One adapter serves both sides of the messaging transport: it pairs and
//! tears down the session, and sends text to phone numbers and group chats.

use crate::config::WhatsAppConfig;
use crate::dispatch::{BulkTransport, DeliveryOutcome};
use crate::formatter::{WHATSAPP_MAX_MESSAGE_LEN, split_message};
use crate::session::{LifecycleEvent, SessionEvent, SessionTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use whatsapp_rust::types::events::Event;

type SharedClient = Arc<Mutex<Option<Arc<whatsapp_rust::client::Client>>>>;

/// The running bot and the task watching it for exit.
struct BotTasks {
    bot: AbortHandle,
    watcher: JoinHandle<()>,
}

impl BotTasks {
    fn abort(self) {
        self.bot.abort();
        self.watcher.abort();
    }
}

pub struct WhatsAppTransport {
    session_dir: PathBuf,
    client: SharedClient,
    /// Session the current bot was started for; events from older bots are dropped.
    active_session: Arc<Mutex<Option<Uuid>>>,
    bot: Mutex<Option<BotTasks>>,
}

impl WhatsAppTransport {
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        Ok(Self {
            session_dir: config.resolve_session_dir()?,
            client: Arc::new(Mutex::new(None)),
            active_session: Arc::new(Mutex::new(None)),
            bot: Mutex::new(None),
        })
    }

    async fn stop_bot(&self) {
        *self.active_session.lock().await = None;
        if let Some(tasks) = self.bot.lock().await.take() {
            tasks.abort();
        }
        *self.client.lock().await = None;
    }

    async fn connected_client(&self) -> Result<Arc<whatsapp_rust::client::Client>> {
        self.client
            .lock()
            .await
            .clone()
            .context("WhatsApp client is not connected")
    }
}

/// Translate a bot event into a session lifecycle event, if it is one.
fn lifecycle_event(event: &Event) -> Option<LifecycleEvent> {
    match event {
        Event::PairingQrCode { code, .. } | Event::PairingCode { code, .. } => {
            Some(LifecycleEvent::PairingCodeIssued {
                payload: code.to_string(),
            })
        }
        Event::Connected(_) => Some(LifecycleEvent::Ready {
            phone_number: None,
            client_name: Some("WhatsApp".to_string()),
        }),
        Event::PairError(pair_error) => Some(LifecycleEvent::AuthenticationFailed {
            reason: format!("{:?}", pair_error),
        }),
        Event::Disconnected(_) => Some(LifecycleEvent::Disconnected {
            reason: "WhatsApp connection closed".to_string(),
            requires_reconnection: true,
        }),
        _ => None,
    }
}

#[async_trait]
impl SessionTransport for WhatsAppTransport {
    async fn begin_pairing(
        &self,
        session_id: Uuid,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<()> {
        self.stop_bot().await;
        *self.active_session.lock().await = Some(session_id);

        std::fs::create_dir_all(&self.session_dir).with_context(|| {
            format!(
                "Failed to create WhatsApp session directory: {}",
                self.session_dir.display()
            )
        })?;
        let session_db = self.session_dir.join("whatsapp.db");
        let session_db_str = session_db.to_string_lossy().to_string();
        debug!("WhatsApp session database path: {}", session_db_str);

        let backend = Arc::new(
            whatsapp_rust::store::SqliteStore::new(&session_db_str)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open WhatsApp session store: {}", e))?,
        );
        let transport_factory = whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory::new();
        let http_client = whatsapp_rust_ureq_http_client::UreqHttpClient::new();

        let client_storage = self.client.clone();
        let active = self.active_session.clone();
        let bot_events = events.clone();
        let mut bot = whatsapp_rust::bot::Bot::builder()
            .with_backend(backend)
            .with_transport_factory(transport_factory)
            .with_http_client(http_client)
            .on_event(move |event, client| {
                let client_storage = client_storage.clone();
                let active = active.clone();
                let events = bot_events.clone();
                async move {
                    let slot = match &event {
                        Event::Connected(_) => Some(Some(client.clone())),
                        Event::Disconnected(_) => Some(None),
                        _ => None,
                    };
                    if let Some(value) = slot
                        && !set_if_active(&active, &client_storage, session_id, value).await
                    {
                        debug!("dropping event from superseded WhatsApp bot {}", session_id);
                        return;
                    }
                    match lifecycle_event(&event) {
                        Some(lifecycle) => {
                            debug!("WhatsApp {} for session {}", lifecycle.name(), session_id);
                            if events
                                .send(SessionEvent::new(session_id, lifecycle))
                                .await
                                .is_err()
                            {
                                warn!("session event channel closed; dropping WhatsApp event");
                            }
                        }
                        None => {
                            debug!(
                                "WhatsApp event (not handled): {:?}",
                                std::mem::discriminant(&event)
                            );
                        }
                    }
                }
            })
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to build WhatsApp bot: {}", e))?;

        let handle = bot
            .run()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start WhatsApp bot: {}", e))?;
        let bot_abort = handle.abort_handle();
        let client_storage = self.client.clone();
        let active = self.active_session.clone();
        let watcher = tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!("WhatsApp bot task error: {}", e);
            }
            set_if_active(&active, &client_storage, session_id, None).await;
            let _ = events
                .send(SessionEvent::new(
                    session_id,
                    LifecycleEvent::Disconnected {
                        reason: "WhatsApp bot stopped".to_string(),
                        requires_reconnection: true,
                    },
                ))
                .await;
        });
        *self.bot.lock().await = Some(BotTasks {
            bot: bot_abort,
            watcher,
        });
        info!("WhatsApp pairing started for session {}", session_id);
        Ok(())
    }

    async fn teardown(&self, session_id: Uuid) -> Result<()> {
        self.stop_bot().await;
        info!("WhatsApp session {} torn down", session_id);
        Ok(())
    }
}

#[async_trait]
impl BulkTransport for WhatsAppTransport {
    async fn send_to_numbers(
        &self,
        phone_numbers: &[String],
        text: &str,
    ) -> Result<Vec<DeliveryOutcome>> {
        let client = self.connected_client().await?;
        let chunks = split_message(text, WHATSAPP_MAX_MESSAGE_LEN);
        let mut outcomes = Vec::with_capacity(phone_numbers.len());
        for number in phone_numbers {
            let outcome = match send_chunks(&client, &phone_jid(number), &chunks).await {
                Ok(()) => DeliveryOutcome::delivered(number.clone()),
                Err(e) => DeliveryOutcome::failed(number.clone(), format!("{:#}", e)),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn send_to_group(&self, group_ref: &str, text: &str) -> Result<DeliveryOutcome> {
        let client = self.connected_client().await?;
        let chunks = split_message(text, WHATSAPP_MAX_MESSAGE_LEN);
        Ok(
            match send_chunks(&client, &group_jid(group_ref), &chunks).await {
                Ok(()) => DeliveryOutcome::delivered(group_ref),
                Err(e) => DeliveryOutcome::failed(group_ref, format!("{:#}", e)),
            },
        )
    }
}

/// Write `value` into `slot` only while `session_id` is the active session.
async fn set_if_active<T>(
    active: &Mutex<Option<Uuid>>,
    slot: &Mutex<Option<T>>,
    session_id: Uuid,
    value: Option<T>,
) -> bool {
    let active = active.lock().await;
    if *active != Some(session_id) {
        return false;
    }
    *slot.lock().await = value;
    true
}

async fn send_chunks(
    client: &Arc<whatsapp_rust::client::Client>,
    jid_str: &str,
    chunks: &[String],
) -> Result<()> {
    let jid = whatsapp_rust::Jid::from_str(jid_str)
        .map_err(|e| anyhow::anyhow!("Invalid WhatsApp JID '{}': {}", jid_str, e))?;
    for (i, chunk) in chunks.iter().enumerate() {
        let message = whatsapp_rust::waproto::whatsapp::Message {
            conversation: Some(chunk.clone()),
            ..Default::default()
        };
        let msg_id = Box::pin(client.send_message(jid.clone(), message))
            .await
            .map_err(|e| anyhow::anyhow!("WhatsApp send error: {}", e))?;
        debug!(
            "WhatsApp chunk {}/{} sent to {}: id={}",
            i + 1,
            chunks.len(),
            jid,
            msg_id
        );
    }
    Ok(())
}

/// `+15550001` -> `15550001@s.whatsapp.net`
fn phone_jid(phone_number: &str) -> String {
    let user = phone_number.trim().trim_start_matches('+');
    if user.contains('@') {
        return user.to_string();
    }
    format!("{}@s.whatsapp.net", user)
}

/// Group chat references are used as-is when they carry a server part;
/// bare ids get the `g.us` group server.
fn group_jid(group_ref: &str) -> String {
    let group_ref = group_ref.trim();
    if group_ref.contains('@') {
        group_ref.to_string()
    } else {
        format!("{}@g.us", group_ref)
    }
}

/// Print a pairing payload as a terminal QR code.
pub fn print_pairing_qr(payload: &str) {
    println!("\n🤖 WhatsApp QR Code:");
    if let Err(e) = qr2term::print_qr(payload) {
        warn!("qr2term failed: {}, falling back to qrcode crate", e);
        match qrcode::QrCode::new(payload) {
            Ok(qr) => {
                let rendered = qr
                    .render::<char>()
                    .quiet_zone(false)
                    .module_dimensions(2, 1)
                    .build();
                println!("{}", rendered);
            }
            Err(e2) => {
                warn!("Failed to generate QR code: {}", e2);
                println!("Pairing code: {}", payload);
            }
        }
    }
    println!("\nScan with WhatsApp: Settings > Linked Devices > Link a Device");
}
