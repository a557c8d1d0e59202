mod subcommands;


use crate::address_book::{AddressBook, Contact, Group};
use crate::config::{Config, load_config};
use crate::content::{ContentAggregator, ContentCategory, HttpContentStore};
use crate::dispatch::{DeliveryStatus, DispatchReport};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bulletin", version)]
#[command(about = "Bulk content announcements over a paired messaging session")]
pub struct Cli {
    /// Config file (default: $BULLETIN_HOME/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
    /// Manage contacts
    Contacts {
        #[command(subcommand)]
        cmd: ContactCommands,
    },
    /// Manage recipient groups
    Groups {
        #[command(subcommand)]
        cmd: GroupCommands,
    },
    /// Browse shareable content
    Content {
        #[command(subcommand)]
        cmd: ContentCommands,
    },
    /// Show configuration and address book status
    Status,
    /// Pair a WhatsApp session and send items to recipients
    #[cfg(feature = "channel-whatsapp")]
    Send {
        /// Content item id, in send order (repeatable)
        #[arg(long = "item", required = true)]
        items: Vec<String>,
        /// Contact id (repeatable)
        #[arg(long = "contact")]
        contacts: Vec<String>,
        /// Group id, expanded to its members (repeatable)
        #[arg(long = "group")]
        groups: Vec<String>,
        /// Group id, posted to its group chat (repeatable)
        #[arg(long = "group-chat")]
        group_chats: Vec<String>,
        /// Seconds between items
        #[arg(long)]
        delay: Option<u64>,
        /// Give up if pairing does not complete within this many seconds
        #[arg(long, default_value_t = 180)]
        pair_timeout: u64,
    },
}

#[derive(Subcommand)]
enum ContactCommands {
    /// Add a contact
    Add {
        name: String,
        phone: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List contacts, optionally filtered
    List {
        #[arg(long, short = 's')]
        search: Option<String>,
    },
    /// Edit a contact
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a contact
    Delete { id: String },
    /// Import contacts from a name,phone,email file
    Import { path: PathBuf },
    /// Export contacts as name,phone,email
    Export {
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// Create a group from contact ids
    Create {
        name: String,
        #[arg(long = "member", required = true)]
        members: Vec<String>,
        /// Group chat reference on the messaging transport
        #[arg(long)]
        chat_ref: Option<String>,
    },
    /// List groups
    List,
    /// Show a group and its resolved recipients
    Show { id: String },
    /// Add a contact to a group
    AddMember { group: String, contact: String },
    /// Remove a contact from a group
    RemoveMember { group: String, contact: String },
    /// Delete a group
    Delete { id: String },
}

#[derive(Subcommand)]
enum ContentCommands {
    /// List items, newest first
    List {
        #[arg(long, short = 'c')]
        category: Option<ContentCategory>,
        #[arg(long, short = 's')]
        search: Option<String>,
    },
    /// Print the message an item renders to
    Preview { id: String },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    if let Commands::Init { force } = cli.command {
        return subcommands::init_command(cli.config.as_deref(), force);
    }
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Contacts { cmd } => {
            subcommands::contacts_command(&config, cmd)?;
        }
        Commands::Groups { cmd } => {
            subcommands::groups_command(&config, cmd)?;
        }
        Commands::Content { cmd } => {
            subcommands::content_command(&config, cmd).await?;
        }
        Commands::Status => {
            subcommands::status_command(&config, cli.config.as_deref())?;
        }
        #[cfg(feature = "channel-whatsapp")]
        Commands::Send {
            items,
            contacts,
            groups,
            group_chats,
            delay,
            pair_timeout,
        } => {
            subcommands::send_command(
                &config,
                subcommands::SendArgs {
                    items,
                    contacts,
                    groups,
                    group_chats,
                    delay,
                    pair_timeout,
                },
            )
            .await?;
        }
    }

    Ok(())
}

fn open_address_book(config: &Config) -> Result<AddressBook> {
    let path = config.address_book.resolve_db_path()?;
    AddressBook::open(&path, &config.operator.name)
        .with_context(|| format!("Failed to open address book at {}", path.display()))
}

fn content_aggregator(config: &Config) -> Result<ContentAggregator> {
    let store = HttpContentStore::new(&config.content)?;
    Ok(ContentAggregator::new(Arc::new(store)))
}

fn contact_table(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return "No contacts.\n".to_string();
    }
    let name_width = contacts
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36}  {:<name_width$}  {:<16}  EMAIL",
        "ID", "NAME", "PHONE"
    );
    for c in contacts {
        let _ = writeln!(
            out,
            "{:<36}  {:<name_width$}  {:<16}  {}",
            c.id,
            c.name,
            c.phone_number,
            c.email.as_deref().unwrap_or("-")
        );
    }
    out
}

fn group_summary(group: &Group) -> String {
    format!(
        "{}  {} ({} members{})",
        group.id,
        group.name,
        group.member_contact_ids.len(),
        group
            .external_group_ref
            .as_deref()
            .map(|r| format!(", chat {}", r))
            .unwrap_or_default()
    )
}

#[cfg_attr(not(feature = "channel-whatsapp"), allow(dead_code))]
fn report_summary(report: &DispatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Delivered {}/{} messages; {} recipients reached on every item.",
        report.delivered_count(),
        report.deliveries.len(),
        report.succeeded.len()
    );
    for d in &report.deliveries {
        if let DeliveryStatus::Failed(reason) = &d.status {
            let _ = writeln!(out, "  \u{2717} {} (item {}): {}", d.recipient, d.item_id, reason);
        }
    }
    out
}
