//! Serde serialization/deserialization tests for core types.
//!
//! Settings persist cookies and enums as JSON, so the wire names matter.

use chrono::{TimeZone, Utc};

use crate::{ApiCapabilities, ApiCapability, Cookie, LoginResult, LoginStatus, QueryType, Tag};

// ============================================================================
// Enum Wire Names
// ============================================================================

#[test]
fn test_query_type_snake_case() {
    let test_cases = vec![
        (r#""list""#, QueryType::List),
        (r#""img""#, QueryType::Img),
        (r#""thumb""#, QueryType::Thumb),
        (r#""details""#, QueryType::Details),
        (r#""retry""#, QueryType::Retry),
    ];

    for (json, expected) in test_cases {
        let result: QueryType = serde_json::from_str(json).unwrap();
        assert_eq!(result, expected, "Failed for {}", json);
    }
}

#[test]
fn test_login_status_names() {
    assert_eq!(
        serde_json::to_string(&LoginStatus::LoggedOut).unwrap(),
        r#""logged_out""#
    );
    assert_eq!(
        serde_json::to_string(&LoginResult::ALREADY).unwrap(),
        r#""impossible""#
    );
}

#[test]
fn test_capabilities_serialize_as_list() {
    let caps = ApiCapabilities::new()
        .with(ApiCapability::TagListing)
        .with(ApiCapability::Authentication);
    let json = serde_json::to_string(&caps).unwrap();
    assert_eq!(json, r#"["authentication","tag_listing"]"#);
}

// ============================================================================
// Cookie Tests
// ============================================================================

#[test]
fn test_cookie_minimal_json_uses_defaults() {
    let cookie: Cookie = serde_json::from_str(r#"{"name":"sid","value":"abc"}"#).unwrap();

    assert_eq!(cookie.name, "sid");
    assert_eq!(cookie.domain, "");
    assert_eq!(cookie.path, "/");
    assert!(cookie.expires.is_none());
    assert!(!cookie.secure);
}

#[test]
fn test_cookie_with_expiry() {
    let expires = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    let cookie = Cookie::new("sid", "abc")
        .with_domain(".example.com")
        .with_expires(expires)
        .secure();

    let json = serde_json::to_value(&cookie).unwrap();
    assert_eq!(json["domain"], ".example.com");
    assert_eq!(json["secure"], true);

    let parsed: Cookie = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.expires, Some(expires));
}

// ============================================================================
// Tag Tests
// ============================================================================

#[test]
fn test_tag_missing_optional_fields() {
    let tag: Tag = serde_json::from_str(r#"{"name":"landscape"}"#).unwrap();
    assert_eq!(tag, Tag::new("landscape"));
}
