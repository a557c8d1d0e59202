//! Renders a [`ShareableItem`] into one bilingual, WhatsApp-flavoured text body.
//!
//! Layout, top to bottom:
//! 1. header: `<icon> *<nameEn>* | *<nameAr>*`
//! 2. structured slots: title, the category's own fields, icon URL
//! 3. description: English paragraph, then Arabic paragraph
//! 4. media: one line per media reference (omitted when there is none)
//!
//! Absent values render as `N/A` so every item of a category has the same shape.

use crate::content::{Bilingual, ContentCategory, ItemDetails, MediaKind, ShareableItem};
use std::fmt::Write;

pub const NOT_AVAILABLE: &str = "N/A";

/// WhatsApp's per-message text cap, in bytes.
pub const WHATSAPP_MAX_MESSAGE_LEN: usize = 4096;

pub fn category_icon(category: ContentCategory) -> &'static str {
    match category {
        ContentCategory::Person => "🕊️",
        ContentCategory::News => "📰",
        ContentCategory::Activity => "📅",
        ContentCategory::Place => "📍",
        ContentCategory::Legend => "📜",
    }
}

pub fn media_icon(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "🖼️",
        MediaKind::Video => "🎬",
        MediaKind::Panorama => "🌐",
    }
}

fn media_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "Image",
        MediaKind::Video => "Video",
        MediaKind::Panorama => "Panorama",
    }
}

fn or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => NOT_AVAILABLE,
    }
}

fn pair(en: Option<&str>, ar: Option<&str>) -> String {
    format!("{} | {}", or_na(en), or_na(ar))
}

fn bilingual(value: &Bilingual) -> String {
    pair(value.en.as_deref(), value.ar.as_deref())
}

/// Ordered `(label, value)` slots for an item's structured section.
pub fn structured_fields(item: &ShareableItem) -> Vec<(&'static str, String)> {
    let mut fields = vec![(
        "Title",
        pair(item.title_en.as_deref(), item.title_ar.as_deref()),
    )];

    match &item.details {
        ItemDetails::Person {
            alias,
            date_of_record,
            birth_place,
            place_of_record,
            family_status,
        } => {
            fields.push(("Alias", bilingual(alias)));
            fields.push((
                "Date of record",
                or_na(date_of_record.as_deref()).to_string(),
            ));
            fields.push(("Place of birth", bilingual(birth_place)));
            fields.push(("Place of record", bilingual(place_of_record)));
            fields.push(("Family status", bilingual(family_status)));
        }
        ItemDetails::News {
            published_date,
            source,
        } => {
            fields.push(("Published", or_na(published_date.as_deref()).to_string()));
            fields.push(("Source", bilingual(source)));
        }
        ItemDetails::Activity {
            date,
            location,
            organizer,
        } => {
            fields.push(("Date", or_na(date.as_deref()).to_string()));
            fields.push(("Location", bilingual(location)));
            fields.push(("Organizer", bilingual(organizer)));
        }
        ItemDetails::Place {
            location,
            coordinates,
        } => {
            fields.push(("Location", bilingual(location)));
            fields.push((
                "Coordinates",
                coordinates.map_or_else(
                    || NOT_AVAILABLE.to_string(),
                    |(lat, lon)| format!("{:.5}, {:.5}", lat, lon),
                ),
            ));
        }
        ItemDetails::Legend { era, region } => {
            fields.push(("Era", bilingual(era)));
            fields.push(("Region", bilingual(region)));
        }
    }

    fields.push(("Icon", or_na(item.icon_url.as_deref()).to_string()));
    fields
}

/// Render an item into its message body. Pure and deterministic.
pub fn format(item: &ShareableItem) -> String {
    let mut out = String::new();
    // writeln! into a String cannot fail
    let _ = writeln!(
        out,
        "{} *{}* | *{}*",
        category_icon(item.category),
        or_na(Some(&item.name_en)),
        or_na(Some(&item.name_ar)),
    );

    out.push('\n');
    for (label, value) in structured_fields(item) {
        let _ = writeln!(out, "{}: {}", label, value);
    }

    out.push('\n');
    out.push_str(or_na(item.description_en.as_deref()).trim());
    out.push_str("\n\n");
    out.push_str(or_na(item.description_ar.as_deref()).trim());
    out.push('\n');

    if !item.media_refs.is_empty() {
        out.push_str("\nMedia:\n");
        let mut counts = [0usize; 3];
        for media in &item.media_refs {
            let slot = match media.kind {
                MediaKind::Image => 0,
                MediaKind::Video => 1,
                MediaKind::Panorama => 2,
            };
            counts[slot] += 1;
            let _ = writeln!(
                out,
                "{} {} {}: {}",
                media_icon(media.kind),
                media_label(media.kind),
                counts[slot],
                media.url
            );
        }
    }

    out.trim_end().to_string()
}

/// Split a message into chunks of at most `limit` bytes.
///
/// Prefers paragraph breaks, then line breaks, then a hard cut at a UTF-8
/// character boundary.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > limit {
        // Largest byte index <= limit that is a char boundary
        let mut split_at = limit;
        while split_at > 0 && !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        if split_at == 0 {
            // Degenerate case: one character wider than the limit
            split_at = remaining
                .char_indices()
                .nth(1)
                .map_or(remaining.len(), |(i, _)| i);
        }

        // Paragraph boundary within the safe range
        if let Some(idx) = remaining[..split_at].rfind("\n\n") {
            chunks.push(remaining[..idx].trim().to_string());
            remaining = &remaining[idx + 2..];
            continue;
        }

        // Single newline
        if let Some(idx) = remaining[..split_at].rfind('\n') {
            chunks.push(remaining[..idx].trim().to_string());
            remaining = &remaining[idx + 1..];
            continue;
        }

        // Hard cut at the char boundary
        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    if !remaining.is_empty() {
        chunks.push(remaining.trim().to_string());
    }

    // A leading "\n\n" leaves an empty chunk after trimming
    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}
