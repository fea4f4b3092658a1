//! External tests for the backend wire types — serialization casing and
//! lenient response deserialization.

use arys_client::api::*;
use arys_client::auth::Identity;

// -- Request serialization --------------------------------------------------

#[test]
fn test_login_request_fields() {
    let json = serde_json::to_value(LoginRequest {
        contact: "user@host".into(),
        password: "pw".into(),
    })
    .expect("serialize");
    assert_eq!(json["contact"], "user@host");
    assert_eq!(json["password"], "pw");
}

#[test]
fn test_sign_up_request_role_envelope() {
    let identity = Identity::new("user@host", "pw");
    let json = serde_json::to_value(SignUpRequest::user(&identity, "Grace Hopper"))
        .expect("serialize");
    assert_eq!(json["contact"], "user@host");
    assert_eq!(json["nombres"], "Grace Hopper");
    assert_eq!(json["roleRequest"]["roleListName"], serde_json::json!(["USER"]));
}

#[test]
fn test_text_request_camel_case() {
    let json = serde_json::to_string(&TextRequest {
        user_message: "hola arys".into(),
    })
    .expect("serialize");
    assert!(json.contains("\"userMessage\":\"hola arys\""));
}

// -- Response deserialization -----------------------------------------------

#[test]
fn test_login_response_with_numeric_status() {
    let json = r#"{"jwt":"token","contact":"u@h","message":"ok","status":200}"#;
    let resp: LoginResponse = serde_json::from_str(json).expect("deser");
    assert_eq!(resp.jwt.as_deref(), Some("token"));
}

#[test]
fn test_login_response_with_string_status() {
    let json = r#"{"jwt":"token","status":"OK"}"#;
    let resp: LoginResponse = serde_json::from_str(json).expect("deser");
    assert_eq!(resp.jwt.as_deref(), Some("token"));
}

#[test]
fn test_login_failure_body() {
    let resp: LoginResponse =
        serde_json::from_str(r#"{"message":"bad credentials"}"#).expect("deser");
    assert!(resp.jwt.is_none());
    assert_eq!(resp.message.as_deref(), Some("bad credentials"));
}

#[test]
fn test_history_mixed_turns() {
    let json = r#"{
        "data": [
            {"user": "hi", "arys": "hello", "imgLink": null},
            {"user": "draw a cat", "arys": null, "imgLink": "http://host/cat.png"},
            {"arys": "orphan reply"}
        ],
        "pagination": {"paginationKey": 3}
    }"#;
    let resp: HistoryResponse = serde_json::from_str(json).expect("deser");
    assert_eq!(resp.data.len(), 3);
    assert_eq!(resp.data[0].arys.as_deref(), Some("hello"));
    assert_eq!(resp.data[1].img_link.as_deref(), Some("http://host/cat.png"));
    assert!(resp.data[2].user.is_none());
    assert_eq!(resp.pagination.expect("pagination")["paginationKey"], 3);
}

#[test]
fn test_history_empty_body() {
    let resp: HistoryResponse = serde_json::from_str("{}").expect("deser");
    assert!(resp.data.is_empty());
}

#[test]
fn test_history_entry_with_unknown_fields() {
    // Forward compatibility: extra fields from the backend are ignored.
    let json = r#"{"user":"hi","arys":"hello","timestamp":1700000000}"#;
    let entry: HistoryEntry = serde_json::from_str(json).expect("deser");
    assert_eq!(entry.user.as_deref(), Some("hi"));
}
