use super::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalized_numbers_are_stable(digits in "[1-9][0-9]{6,14}") {
        let plus = format!("+{}", digits);
        let normalized = normalize_phone(&plus).unwrap();
        prop_assert_eq!(&normalized, &plus);
        // normalizing twice changes nothing
        prop_assert_eq!(normalize_phone(&normalized).unwrap(), normalized);
    }

    #[test]
    fn separators_do_not_change_result(digits in "[1-9][0-9]{6,14}") {
        let spaced: String = digits
            .chars()
            .enumerate()
            .flat_map(|(i, c)| if i % 3 == 2 { vec![c, '-'] } else { vec![c] })
            .collect();
        let spaced = format!("+{}", spaced.trim_end_matches('-'));
        prop_assert_eq!(normalize_phone(&spaced).unwrap(), format!("+{}", digits));
    }

    #[test]
    fn never_panics(input in "\\PC{0,30}") {
        let _ = normalize_phone(&input);
    }
}

#[test]
fn test_strips_formatting() {
    assert_eq!(normalize_phone("+1 (555) 000-1234").unwrap(), "+15550001234");
    assert_eq!(normalize_phone(" +44 20.7946.0958 ").unwrap(), "+442079460958");
}

#[test]
fn test_double_zero_prefix() {
    assert_eq!(normalize_phone("00961 3 123456").unwrap(), "+9613123456");
}

#[test]
fn test_bare_digits_get_plus() {
    assert_eq!(normalize_phone("15550001").unwrap(), "+15550001");
}

#[test]
fn test_arabic_indic_digits() {
    assert_eq!(
        normalize_phone("+٩٦١٣١٢٣٤٥٦").unwrap(),
        "+9613123456"
    );
    assert_eq!(normalize_phone("+۹۶۱۳۱۲۳۴۵۶").unwrap(), "+9613123456");
}

#[test]
fn test_rejects_garbage() {
    let err = normalize_phone("not-a-number").unwrap_err();
    assert!(err.to_string().contains("invalid phone format"));
    assert!(normalize_phone("+0123456789").is_err());
    assert!(normalize_phone("+12345").is_err());
    assert!(normalize_phone("+1234567890123456").is_err());
}

#[test]
fn test_rejects_empty() {
    let err = normalize_phone("   ").unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[test]
fn test_validate_email() {
    assert_eq!(
        validate_email(" ann@example.org ").unwrap(),
        "ann@example.org"
    );
    assert!(validate_email("ann").is_err());
    assert!(validate_email("@example.org").is_err());
    assert!(validate_email("ann@example").is_err());
    assert!(validate_email("ann@@example.org").is_err());
    assert!(validate_email("a nn@example.org").is_err());
}
