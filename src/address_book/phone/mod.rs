use crate::errors::{BulletinError, BulletinResult};
use regex::Regex;
use std::sync::LazyLock;

static E164: LazyLock<Regex> = LazyLock::new(|| {
    // ASCII digits only: `\d` would also accept other Unicode digit classes
    Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("Failed to compile E.164 regex")
});

/// Normalize a user-entered phone number to E.164 (`+` followed by digits).
///
/// Accepts common separators (spaces, dashes, dots, parentheses), an
/// international `00` prefix, Arabic-Indic digits, and bare digit strings.
pub fn normalize_phone(raw: &str) -> BulletinResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BulletinError::validation("phone number is empty"));
    }

    let mut cleaned = String::with_capacity(trimmed.len() + 1);
    for c in trimmed.chars() {
        match c {
            ' ' | '-' | '.' | '(' | ')' | '\u{a0}' => {}
            '\u{0660}'..='\u{0669}' => cleaned.push(ascii_digit(c, '\u{0660}')),
            '\u{06F0}'..='\u{06F9}' => cleaned.push(ascii_digit(c, '\u{06F0}')),
            _ => cleaned.push(c),
        }
    }

    let normalized = if let Some(rest) = cleaned.strip_prefix("00") {
        format!("+{}", rest)
    } else if cleaned.starts_with('+') {
        cleaned
    } else {
        format!("+{}", cleaned)
    };

    if E164.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(BulletinError::validation(format!(
            "invalid phone format: {}",
            trimmed
        )))
    }
}

fn ascii_digit(c: char, zero: char) -> char {
    char::from(b'0' + (c as u32 - zero as u32) as u8)
}

/// Minimal shape check for an optional contact email.
pub fn validate_email(raw: &str) -> BulletinResult<String> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email.to_string())
    } else {
        Err(BulletinError::validation(format!(
            "invalid email address: {}",
            email
        )))
    }
}

#[cfg(test)]
mod tests;
