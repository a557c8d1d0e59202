use super::{
    Config, ContactCommands, ContentCategory, ContentCommands, Context, GroupCommands,
    contact_table, content_aggregator, group_summary, open_address_book,
};
use crate::address_book::{ContactUpdate, NewContact, parse_contact_rows};
use crate::config::{get_config_path, save_config};
use crate::content::ContentFilter;
use crate::formatter;
use anyhow::{Result, bail};
use std::path::Path;

pub(super) fn init_command(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    save_config(&Config::default(), Some(&path))?;
    println!("Wrote default config to {}", path.display());
    println!("Set content.baseUrl before using `bulletin content`.");
    Ok(())
}

pub(super) fn contacts_command(config: &Config, cmd: ContactCommands) -> Result<()> {
    let book = open_address_book(config)?;
    match cmd {
        ContactCommands::Add {
            name,
            phone,
            email,
            notes,
        } => {
            let contact = book.add_contact(NewContact {
                name,
                phone_number: phone,
                email,
                notes,
            })?;
            println!(
                "Added {} ({}) with id {}",
                contact.name, contact.phone_number, contact.id
            );
        }
        ContactCommands::List { search } => {
            let contacts = match search {
                Some(query) => book.search_contacts(&query)?,
                None => book.list_contacts()?,
            };
            print!("{}", contact_table(&contacts));
        }
        ContactCommands::Edit {
            id,
            name,
            phone,
            email,
            notes,
        } => {
            let contact = book.update_contact(
                &id,
                ContactUpdate {
                    name,
                    phone_number: phone,
                    email,
                    notes,
                },
            )?;
            println!("Updated {} ({})", contact.name, contact.phone_number);
        }
        ContactCommands::Delete { id } => {
            book.delete_contact(&id)?;
            println!("Deleted contact {}", id);
        }
        ContactCommands::Import { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let report = book.import_contacts(&parse_contact_rows(&text));
            println!(
                "Imported {} contacts, {} rows rejected",
                report.imported.len(),
                report.failed.len()
            );
            for failure in &report.failed {
                println!(
                    "  row {} ({}, {}): {}",
                    failure.row, failure.name, failure.phone, failure.reason
                );
            }
        }
        ContactCommands::Export { output } => {
            let text = book.export_contacts()?;
            match output {
                Some(path) => {
                    crate::utils::atomic_write(&path, &text)?;
                    println!("Exported contacts to {}", path.display());
                }
                None => print!("{}", text),
            }
        }
    }
    Ok(())
}

pub(super) fn groups_command(config: &Config, cmd: GroupCommands) -> Result<()> {
    let book = open_address_book(config)?;
    match cmd {
        GroupCommands::Create {
            name,
            members,
            chat_ref,
        } => {
            let group = book.create_group(&name, &members, chat_ref.as_deref())?;
            println!("Created {}", group_summary(&group));
        }
        GroupCommands::List => {
            let groups = book.list_groups()?;
            if groups.is_empty() {
                println!("No groups.");
            }
            for group in &groups {
                println!("{}", group_summary(group));
            }
        }
        GroupCommands::Show { id } => {
            let group = book.get_group(&id)?;
            println!("{}", group_summary(&group));
            for phone in book.resolve_group_recipients(&id)? {
                println!("  {}", phone);
            }
        }
        GroupCommands::AddMember { group, contact } => {
            book.add_group_member(&group, &contact)?;
            println!("Added {} to {}", contact, group);
        }
        GroupCommands::RemoveMember { group, contact } => {
            book.remove_group_member(&group, &contact)?;
            println!("Removed {} from {}", contact, group);
        }
        GroupCommands::Delete { id } => {
            book.delete_group(&id)?;
            println!("Deleted group {}", id);
        }
    }
    Ok(())
}

pub(super) async fn content_command(config: &Config, cmd: ContentCommands) -> Result<()> {
    let aggregator = content_aggregator(config)?;
    match cmd {
        ContentCommands::List { category, search } => {
            let items = aggregator
                .fetch_all(&ContentFilter {
                    category,
                    search_text: search,
                })
                .await;
            if items.is_empty() {
                println!("No content items.");
            }
            for item in &items {
                println!(
                    "{}  [{}]  {} | {}  {}",
                    item.id,
                    item.category,
                    item.name_en,
                    item.name_ar,
                    item.created_at
                        .map(|t| t.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        ContentCommands::Preview { id } => {
            let item = aggregator.fetch_item(&id).await?;
            println!("{}", formatter::format(&item));
        }
    }
    Ok(())
}

pub(super) fn status_command(config: &Config, config_override: Option<&Path>) -> Result<()> {
    let config_path = match config_override {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };
    let mark = |ok: bool| if ok { "\u{2713}" } else { "\u{2717}" };

    println!("bulletin {} status\n", crate::VERSION);
    println!(
        "Config: {} {}",
        config_path.display(),
        mark(config_path.exists())
    );

    let db_path = config.address_book.resolve_db_path()?;
    if db_path.exists() {
        let book = open_address_book(config)?;
        println!(
            "Address book: {} ({} contacts, {} groups)",
            db_path.display(),
            book.list_contacts()?.len(),
            book.list_groups()?.len()
        );
    } else {
        println!("Address book: {} {}", db_path.display(), mark(false));
    }

    if config.content.base_url.is_empty() {
        println!("Content API: not configured");
    } else {
        println!(
            "Content API: {} (token {})",
            config.content.base_url,
            mark(config.content.api_key.is_some())
        );
    }
    for category in ContentCategory::ALL {
        let path = match category {
            ContentCategory::Person => &config.content.persons_path,
            ContentCategory::News => &config.content.news_path,
            ContentCategory::Activity => &config.content.activities_path,
            ContentCategory::Place => &config.content.places_path,
            ContentCategory::Legend => &config.content.legends_path,
        };
        println!("  {:<9} /{}", category.as_str(), path.trim_start_matches('/'));
    }

    let d = &config.dispatch;
    println!(
        "Dispatch: delay {}s (allowed {}-{}s), cooldown {}s, max {} deliveries per batch",
        d.default_delay_secs, d.min_delay_secs, d.max_delay_secs, d.cooldown_secs,
        d.max_deliveries_per_batch
    );

    let session_dir = config.whatsapp.resolve_session_dir()?;
    println!(
        "WhatsApp: {} (session store {} {})",
        if config.whatsapp.enabled {
            "enabled"
        } else {
            "disabled"
        },
        session_dir.display(),
        mark(session_dir.join("whatsapp.db").exists())
    );
    if !cfg!(feature = "channel-whatsapp") {
        println!("  built without the channel-whatsapp feature; `send` is unavailable");
    }
    Ok(())
}

#[cfg(feature = "channel-whatsapp")]
pub(super) struct SendArgs {
    pub items: Vec<String>,
    pub contacts: Vec<String>,
    pub groups: Vec<String>,
    pub group_chats: Vec<String>,
    pub delay: Option<u64>,
    pub pair_timeout: u64,
}

#[cfg(feature = "channel-whatsapp")]
pub(super) async fn send_command(config: &Config, args: SendArgs) -> Result<()> {
    use super::report_summary;
    use crate::channels::whatsapp::WhatsAppTransport;
    use crate::dispatch::{DispatchEngine, DispatchRequest};
    use crate::session::SessionManager;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::warn;

    if !config.whatsapp.enabled {
        bail!("WhatsApp is disabled; set whatsapp.enabled in the config");
    }

    let book = Arc::new(open_address_book(config)?);
    for id in &args.contacts {
        book.select_contact(id)?;
    }
    for id in &args.groups {
        book.select_group(id)?;
    }
    let selection = book.selection();

    let available = content_aggregator(config)?
        .fetch_all(&ContentFilter::default())
        .await;
    let items = args
        .items
        .iter()
        .map(|id| {
            available
                .iter()
                .find(|item| &item.id == id)
                .cloned()
                .with_context(|| format!("content item not found: {}", id))
        })
        .collect::<Result<Vec<_>>>()?;

    let transport = Arc::new(WhatsAppTransport::new(&config.whatsapp)?);
    let session = Arc::new(SessionManager::new(transport.clone()));
    let _event_loop = session.spawn_event_loop();
    let mut state_rx = session.subscribe();
    session.request_connection().await?;

    tokio::time::timeout(
        Duration::from_secs(args.pair_timeout),
        wait_for_pairing(&mut state_rx),
    )
        .await
        .context("timed out waiting for WhatsApp pairing")??;
    println!("WhatsApp connected.");

    let engine = DispatchEngine::new(
        session.clone(),
        book.clone(),
        transport,
        config.dispatch.clone(),
    );
    let result = engine
        .send(DispatchRequest {
            items,
            contact_ids: selection.contact_ids.into_iter().collect(),
            group_ids: selection.group_ids.into_iter().collect(),
            group_chat_ids: args.group_chats,
            inter_message_delay_secs: args.delay.unwrap_or(config.dispatch.default_delay_secs),
        })
        .await;
    book.clear_selection();

    let state = session.current_state();
    if state.is_connected() {
        if let Err(e) = session.disconnect().await {
            warn!("failed to disconnect WhatsApp session: {}", e);
        }
    } else if state.reconnect_required {
        println!("WhatsApp dropped the linked session; the next send will pair again.");
    }
    let report = result?;
    print!("{}", report_summary(&report));
    Ok(())
}

/// Wait until the session connects, printing each new pairing code.
#[cfg(feature = "channel-whatsapp")]
async fn wait_for_pairing(
    state_rx: &mut tokio::sync::watch::Receiver<crate::session::Session>,
) -> Result<()> {
    use crate::channels::whatsapp::print_pairing_qr;
    use crate::session::SessionStatus;

    let mut shown: Option<String> = None;
    loop {
        let state = state_rx.borrow_and_update().clone();
        match state.status {
            SessionStatus::Connected => return Ok(()),
            SessionStatus::AuthFailed => bail!("WhatsApp authentication failed"),
            SessionStatus::Disconnected => {
                bail!("WhatsApp session closed before pairing completed")
            }
            SessionStatus::AwaitingPairing => {
                if let Some(payload) = &state.pairing_payload
                    && shown.as_ref() != Some(payload)
                {
                    print_pairing_qr(payload);
                    shown = Some(payload.clone());
                }
            }
        }
        state_rx
            .changed()
            .await
            .context("session manager stopped")?;
    }
}
