pub mod transport;

use crate::address_book::AddressBook;
use crate::config::{DispatchConfig, MAX_DELAY_SECS, MIN_DELAY_SECS};
use crate::content::ShareableItem;
use crate::errors::{BulletinError, BulletinResult};
use crate::formatter;
use crate::session::{Session, SessionManager};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use transport::{BulkTransport, DeliveryOutcome};

/// One send request: what to send and to whom.
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    /// Sent strictly in this order.
    pub items: Vec<ShareableItem>,
    pub contact_ids: Vec<String>,
    /// Groups expanded into their members' phone numbers.
    pub group_ids: Vec<String>,
    /// Groups posted to as group chats through their external reference.
    pub group_chat_ids: Vec<String>,
    pub inter_message_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The transport reported an error for this target.
    Transport(String),
    /// The session left `Connected` before this pair was attempted.
    SessionLost,
    /// The transport returned no outcome for this target.
    MissingOutcome,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::SessionLost => write!(f, "session lost before delivery"),
            Self::MissingOutcome => write!(f, "no delivery outcome reported"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(FailureReason),
}

/// One (recipient, item) pair of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub item_id: String,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub recipient: String,
    pub item_id: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Recipients whose every delivery in the batch succeeded.
    pub succeeded: BTreeSet<String>,
    /// One entry per failed (recipient, item) pair.
    pub failed: Vec<DeliveryFailure>,
    /// Every pair in send order.
    pub deliveries: Vec<Delivery>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DispatchReport {
    fn from_deliveries(deliveries: Vec<Delivery>, started_at: DateTime<Utc>) -> Self {
        let mut any_failed: HashMap<&str, bool> = HashMap::new();
        for d in &deliveries {
            *any_failed.entry(d.recipient.as_str()).or_default() |=
                d.status != DeliveryStatus::Delivered;
        }
        let succeeded = any_failed
            .into_iter()
            .filter(|(_, failed)| !failed)
            .map(|(recipient, _)| recipient.to_string())
            .collect();
        let failed = deliveries
            .iter()
            .filter_map(|d| match &d.status {
                DeliveryStatus::Failed(reason) => Some(DeliveryFailure {
                    recipient: d.recipient.clone(),
                    item_id: d.item_id.clone(),
                    reason: reason.clone(),
                }),
                DeliveryStatus::Delivered => None,
            })
            .collect();
        Self {
            succeeded,
            failed,
            deliveries,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.deliveries.len() - self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Serializes bulk delivery of formatted items over the connected session.
///
/// Only one batch runs at a time; a finished batch starts a cooldown during
/// which new batches are refused.
pub struct DispatchEngine {
    session: Arc<SessionManager>,
    address_book: Arc<AddressBook>,
    transport: Arc<dyn BulkTransport>,
    config: DispatchConfig,
    in_flight: Mutex<()>,
    cooldown_until: std::sync::Mutex<Option<Instant>>,
}

/// Targets captured at batch start.
struct Targets {
    phone_numbers: Vec<String>,
    group_refs: Vec<String>,
}

impl Targets {
    fn len(&self) -> usize {
        self.phone_numbers.len() + self.group_refs.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn all(&self) -> impl Iterator<Item = &String> {
        self.phone_numbers.iter().chain(&self.group_refs)
    }
}

impl DispatchEngine {
    pub fn new(
        session: Arc<SessionManager>,
        address_book: Arc<AddressBook>,
        transport: Arc<dyn BulkTransport>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            session,
            address_book,
            transport,
            config,
            in_flight: Mutex::new(()),
            cooldown_until: std::sync::Mutex::new(None),
        }
    }

    /// Time left before another batch may start, if any.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let until = (*self
            .cooldown_until
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner))?;
        let remaining = until.saturating_duration_since(Instant::now());
        (!remaining.is_zero()).then_some(remaining)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Run one batch to completion and report every (recipient, item) pair.
    ///
    /// Delivery failures are reported, not returned as errors. If the session
    /// leaves `Connected` mid-batch the remaining pairs fail with
    /// [`FailureReason::SessionLost`].
    pub async fn send(&self, mut request: DispatchRequest) -> BulletinResult<DispatchReport> {
        let _batch = self
            .in_flight
            .try_lock()
            .map_err(|_| BulletinError::BatchInProgress)?;

        if let Some(remaining) = self.cooldown_remaining() {
            return Err(BulletinError::CooldownActive {
                remaining_secs: remaining.as_millis().div_ceil(1000) as u64,
            });
        }

        let mut state_rx = self.session.subscribe();
        let session_id = {
            let session = state_rx.borrow_and_update();
            if !session.is_connected() {
                return Err(BulletinError::NotConnected);
            }
            session.id
        };

        let delay_secs = request.inter_message_delay_secs;
        let (min_delay, max_delay) = self.delay_bounds();
        if !(min_delay..=max_delay).contains(&delay_secs) {
            return Err(BulletinError::validation(format!(
                "inter-message delay must be within [{}, {}] seconds, got {}",
                min_delay, max_delay, delay_secs
            )));
        }

        dedup_items(&mut request.items);

        let targets = self.resolve_targets(&request)?;
        if request.items.is_empty() && targets.is_empty() {
            return Err(BulletinError::validation(
                "nothing to send: no items and no recipients",
            ));
        }
        let total = request.items.len() * targets.len();
        if total > self.config.max_deliveries_per_batch {
            return Err(BulletinError::validation(format!(
                "batch of {} items x {} recipients exceeds the limit of {} deliveries",
                request.items.len(),
                targets.len(),
                self.config.max_deliveries_per_batch
            )));
        }

        let started_at = Utc::now();
        info!(
            "dispatching {} items to {} recipients ({}s between items)",
            request.items.len(),
            targets.len(),
            delay_secs
        );
        let deliveries = self
            .run_batch(
                &request.items,
                &targets,
                Duration::from_secs(delay_secs),
                session_id,
                &mut state_rx,
            )
            .await;
        let report = DispatchReport::from_deliveries(deliveries, started_at);

        self.start_cooldown();
        info!(
            "dispatch finished: {} delivered, {} failed, {} recipients fully reached",
            report.delivered_count(),
            report.failed.len(),
            report.succeeded.len()
        );
        Ok(report)
    }

    /// Configured delay range, clamped to the hard `[MIN_DELAY_SECS, MAX_DELAY_SECS]` limits.
    fn delay_bounds(&self) -> (u64, u64) {
        (
            self.config.min_delay_secs.max(MIN_DELAY_SECS),
            self.config.max_delay_secs.min(MAX_DELAY_SECS),
        )
    }

    /// Snapshot of recipients; later address book edits do not affect the batch.
    fn resolve_targets(&self, request: &DispatchRequest) -> BulletinResult<Targets> {
        let phone_numbers = self
            .address_book
            .resolve_recipients(&request.contact_ids, &request.group_ids)?
            .into_iter()
            .collect();

        let mut group_refs = BTreeSet::new();
        for id in &request.group_chat_ids {
            let group = self.address_book.get_group(id)?;
            match group.external_group_ref {
                Some(group_ref) => {
                    group_refs.insert(group_ref);
                }
                None => {
                    return Err(BulletinError::validation(format!(
                        "group '{}' has no external group reference",
                        group.name
                    )));
                }
            }
        }

        Ok(Targets {
            phone_numbers,
            group_refs: group_refs.into_iter().collect(),
        })
    }

    async fn run_batch(
        &self,
        items: &[ShareableItem],
        targets: &Targets,
        delay: Duration,
        session_id: Uuid,
        state_rx: &mut watch::Receiver<Session>,
    ) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(items.len() * targets.len());
        let mut session_lost = false;

        for (idx, item) in items.iter().enumerate() {
            if idx > 0 && !session_lost {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    _ = state_rx.wait_for(|s| !still_active(s, session_id)) => {}
                }
            }
            if !session_lost && !still_active(&state_rx.borrow(), session_id) {
                warn!(
                    "session {} lost mid-batch; abandoning remaining deliveries",
                    session_id
                );
                session_lost = true;
            }
            if session_lost {
                deliveries.extend(targets.all().map(|recipient| Delivery {
                    recipient: recipient.clone(),
                    item_id: item.id.clone(),
                    status: DeliveryStatus::Failed(FailureReason::SessionLost),
                }));
                continue;
            }

            let text = formatter::format(item);
            debug!("sending item {} ({} bytes)", item.id, text.len());
            self.deliver_to_numbers(item, &text, &targets.phone_numbers, &mut deliveries)
                .await;

            for group_ref in &targets.group_refs {
                let status = if still_active(&state_rx.borrow(), session_id) {
                    match self.transport.send_to_group(group_ref, &text).await {
                        Ok(outcome) => match outcome.error {
                            None => DeliveryStatus::Delivered,
                            Some(e) => DeliveryStatus::Failed(FailureReason::Transport(e)),
                        },
                        Err(e) => {
                            DeliveryStatus::Failed(FailureReason::Transport(format!("{:#}", e)))
                        }
                    }
                } else {
                    DeliveryStatus::Failed(FailureReason::SessionLost)
                };
                deliveries.push(Delivery {
                    recipient: group_ref.clone(),
                    item_id: item.id.clone(),
                    status,
                });
            }
        }

        for d in &deliveries {
            if let DeliveryStatus::Failed(reason) = &d.status {
                warn!(
                    "delivery of item {} to {} failed: {}",
                    d.item_id, d.recipient, reason
                );
            }
        }
        deliveries
    }

    async fn deliver_to_numbers(
        &self,
        item: &ShareableItem,
        text: &str,
        numbers: &[String],
        deliveries: &mut Vec<Delivery>,
    ) {
        if numbers.is_empty() {
            return;
        }
        let statuses: Vec<DeliveryStatus> =
            match self.transport.send_to_numbers(numbers, text).await {
                Ok(outcomes) => {
                    let mut by_recipient: HashMap<String, Option<String>> = outcomes
                        .into_iter()
                        .map(|o| (o.recipient, o.error))
                        .collect();
                    numbers
                        .iter()
                        .map(|number| match by_recipient.remove(number) {
                            Some(None) => DeliveryStatus::Delivered,
                            Some(Some(e)) => DeliveryStatus::Failed(FailureReason::Transport(e)),
                            None => DeliveryStatus::Failed(FailureReason::MissingOutcome),
                        })
                        .collect()
                }
                Err(e) => {
                    let reason = FailureReason::Transport(format!("{:#}", e));
                    vec![DeliveryStatus::Failed(reason); numbers.len()]
                }
            };

        deliveries.extend(numbers.iter().zip(statuses).map(|(number, status)| {
            Delivery {
                recipient: number.clone(),
                item_id: item.id.clone(),
                status,
            }
        }));
    }

    fn start_cooldown(&self) {
        let until = Instant::now() + Duration::from_secs(self.config.cooldown_secs);
        *self
            .cooldown_until
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(until);
    }
}

/// Keep the first occurrence of each item id so no number gets the same
/// message twice in one batch.
fn dedup_items(items: &mut Vec<ShareableItem>) {
    let mut seen = HashSet::new();
    items.retain(|item| {
        let first = seen.insert(item.id.clone());
        if !first {
            debug!("dropping repeated item {} from batch", item.id);
        }
        first
    });
}

fn still_active(session: &Session, session_id: Uuid) -> bool {
    session.id == session_id && session.is_connected()
}
