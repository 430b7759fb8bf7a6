use portscan_sim::validate::{validate, Validation, ValidationError};

#[test]
fn documented_cases() {
    assert_eq!(validate("256.1.1.1"), Err(ValidationError::OctetOutOfRange));
    assert_eq!(validate("192.168.1.1"), Ok(()));
    assert_eq!(validate("example.com"), Ok(()));
    assert_eq!(validate("localhost"), Ok(()));
    assert_eq!(validate(""), Err(ValidationError::Empty));
    assert_eq!(validate("not a valid host!!"), Err(ValidationError::Malformed));
}

#[test]
fn messages_match_ui_text() {
    assert_eq!(ValidationError::Empty.to_string(), "Target cannot be empty");
    assert_eq!(
        ValidationError::OctetOutOfRange.to_string(),
        "Invalid IPv4 address. Each octet must be 0-255."
    );
    assert_eq!(
        ValidationError::Malformed.to_string(),
        "Invalid target. Enter a valid IP address or domain name."
    );
}

#[test]
fn validation_wire_shape() {
    let ok = serde_json::to_value(Validation::from(validate("localhost"))).unwrap();
    assert_eq!(ok, serde_json::json!({ "valid": true }));
    let bad = serde_json::to_value(Validation::from(validate(""))).unwrap();
    assert_eq!(
        bad,
        serde_json::json!({ "valid": false, "error": "Target cannot be empty" })
    );
}
