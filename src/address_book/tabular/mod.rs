//! Comma-separated contact rows: `name,phone,email`.

use crate::address_book::{Contact, ImportRow};
use std::borrow::Cow;

pub const HEADER: &str = "name,phone,email";

/// Parse tabular text into import rows.
///
/// Tolerates an optional header row, blank lines, a missing email column,
/// quoted fields (which may span lines), and `;` or tab delimiters when no
/// comma is present.
pub fn parse_contact_rows(text: &str) -> Vec<ImportRow> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = Vec::new();
    let mut delimiter = None;

    for line in records(text) {
        if line.trim().is_empty() {
            continue;
        }
        let delim = *delimiter.get_or_insert_with(|| detect_delimiter(line));
        let fields = split_fields(line, delim);

        if rows.is_empty() && is_header(&fields) {
            continue;
        }

        let mut fields = fields.into_iter();
        let name = fields.next().unwrap_or_default();
        let phone = fields.next().unwrap_or_default();
        let email = fields.next().filter(|e| !e.trim().is_empty());
        rows.push(ImportRow { name, phone, email });
    }
    rows
}

/// Render contacts as tabular text with a header row.
pub fn format_contact_rows(contacts: &[Contact]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for contact in contacts {
        out.push_str(&escape_field(&contact.name));
        out.push(',');
        out.push_str(&escape_field(&contact.phone_number));
        out.push(',');
        out.push_str(&escape_field(contact.email.as_deref().unwrap_or("")));
        out.push('\n');
    }
    out
}

/// Split text into records at line breaks that fall outside quotes.
fn records(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => {
                records.push(text[start..i].trim_end_matches('\r'));
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < text.len() {
        records.push(text[start..].trim_end_matches('\r'));
    }
    records
}

fn detect_delimiter(line: &str) -> char {
    if line.contains(',') {
        ','
    } else if line.contains(';') {
        ';'
    } else if line.contains('\t') {
        '\t'
    } else {
        ','
    }
}

fn is_header(fields: &[String]) -> bool {
    matches!(
        (fields.first(), fields.get(1)),
        (Some(a), Some(b))
            if a.trim().eq_ignore_ascii_case("name") && b.trim().eq_ignore_ascii_case("phone")
    )
}

fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            c if c == delimiter && !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests;
