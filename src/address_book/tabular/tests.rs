use super::*;
use chrono::Utc;

fn contact(name: &str, phone: &str, email: Option<&str>) -> Contact {
    Contact {
        id: "id".to_string(),
        name: name.to_string(),
        phone_number: phone.to_string(),
        email: email.map(str::to_string),
        notes: None,
        added_by: "admin".to_string(),
        created_at: Utc::now(),
    }
}

#[test]
fn test_parse_with_header() {
    let rows = parse_contact_rows("name,phone,email\nAnn,+15550003,ann@example.org\n");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Ann");
    assert_eq!(rows[0].phone, "+15550003");
    assert_eq!(rows[0].email.as_deref(), Some("ann@example.org"));
}

#[test]
fn test_parse_without_header_and_missing_email() {
    let rows = parse_contact_rows("Ann,+15550003\n\nBob,+15550004,\n");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].email, None);
    assert_eq!(rows[1].name, "Bob");
    assert_eq!(rows[1].email, None);
}

#[test]
fn test_parse_header_case_insensitive_with_bom() {
    let rows = parse_contact_rows("\u{feff}Name,Phone,Email\r\nAnn,+15550003,\r\n");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Ann");
}

#[test]
fn test_parse_quoted_fields() {
    let rows = parse_contact_rows("\"Haddad, Rima\",+9613123456,\"r\"\"h@example.org\"\n");
    assert_eq!(rows[0].name, "Haddad, Rima");
    assert_eq!(rows[0].email.as_deref(), Some("r\"h@example.org"));
}

#[test]
fn test_parse_semicolon_and_tab_delimiters() {
    let rows = parse_contact_rows("Ann;+15550003;ann@example.org\n");
    assert_eq!(rows[0].phone, "+15550003");

    let rows = parse_contact_rows("Ann\t+15550003\n");
    assert_eq!(rows[0].phone, "+15550003");
}

#[test]
fn test_parse_single_column_row_keeps_empty_phone() {
    let rows = parse_contact_rows("Lonely\n");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].phone, "");
}

#[test]
fn test_format_column_order_and_escaping() {
    let text = format_contact_rows(&[
        contact("Ann", "+15550003", Some("ann@example.org")),
        contact("Haddad, Rima", "+9613123456", None),
    ]);
    assert_eq!(
        text,
        "name,phone,email\nAnn,+15550003,ann@example.org\n\"Haddad, Rima\",+9613123456,\n"
    );
}

#[test]
fn test_format_output_parses_back() {
    let contacts = vec![
        contact("Ann", "+15550003", Some("ann@example.org")),
        contact("Say \"hi\"", "+15550004", None),
    ];
    let rows = parse_contact_rows(&format_contact_rows(&contacts));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].name, "Say \"hi\"");
    assert_eq!(rows[1].email, None);
}

#[test]
fn test_quoted_field_spans_lines() {
    let text = format_contact_rows(&[
        contact("Ann\nSmith", "+15550003", None),
        contact("Bob", "+15550004", Some("bob@example.org")),
    ]);
    assert!(text.contains("\"Ann\nSmith\""));

    let rows = parse_contact_rows(&text);
    assert_eq!(
        rows,
        vec![
            ImportRow::new("Ann\nSmith", "+15550003", None),
            ImportRow::new("Bob", "+15550004", Some("bob@example.org")),
        ]
    );
}

#[test]
fn test_quoted_crlf_line_breaks() {
    let rows = parse_contact_rows("\"Ann\r\nSmith\",+15550003\r\nBob,+15550004\r\n");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "Ann\r\nSmith");
    assert_eq!(rows[1].phone, "+15550004");
}
