//! Reply parsing tests for the classifier collaborator

use flood_monitor::classifier::{build_prompt, parse_reply};
use flood_monitor::{Message, ParsedReply};

#[test]
fn test_parse_report() {
    let reply = parse_reply(r#"{"classification": "report", "location": "Rua X"}"#).unwrap();
    assert_eq!(
        reply,
        ParsedReply::Report {
            location: "Rua X".to_string()
        }
    );
}

#[test]
fn test_parse_comment() {
    let reply = parse_reply(r#"{"classification": "comment"}"#).unwrap();
    assert_eq!(reply, ParsedReply::Comment);
}

#[test]
fn test_label_is_trimmed_and_case_insensitive() {
    let reply = parse_reply(r#"{"classification": " REPORT ", "location": " Centro "}"#).unwrap();
    assert_eq!(
        reply,
        ParsedReply::Report {
            location: "Centro".to_string()
        }
    );
}

#[test]
fn test_comment_location_is_dropped() {
    let reply = parse_reply(r#"{"classification": "comment", "location": "Centro"}"#).unwrap();
    assert_eq!(reply, ParsedReply::Comment);
}

#[test]
fn test_comment_with_null_location() {
    let reply = parse_reply(r#"{"classification": "comment", "location": null}"#).unwrap();
    assert_eq!(reply, ParsedReply::Comment);
}

#[test]
fn test_report_without_location_is_rejected() {
    assert!(parse_reply(r#"{"classification": "report"}"#).is_err());
    assert!(parse_reply(r#"{"classification": "report", "location": null}"#).is_err());
    assert!(parse_reply(r#"{"classification": "report", "location": "   "}"#).is_err());
}

#[test]
fn test_unknown_label_is_rejected() {
    let err = parse_reply(r#"{"classification": "maybe", "location": "Centro"}"#).unwrap_err();
    assert_eq!(err.kind(), "classification");
}

#[test]
fn test_extra_fields_are_rejected() {
    assert!(parse_reply(r#"{"classification": "comment", "confidence": 0.9}"#).is_err());
}

#[test]
fn test_non_json_is_rejected() {
    assert!(parse_reply("This is a firsthand report from Rua X.").is_err());
    assert!(parse_reply("").is_err());
    assert!(parse_reply(r#"["report", "Rua X"]"#).is_err());
}

#[test]
fn test_fenced_json_is_accepted() {
    let reply = parse_reply("```json\n{\"classification\": \"comment\"}\n```").unwrap();
    assert_eq!(reply, ParsedReply::Comment);
}

#[test]
fn test_prompt_contains_message_text() {
    let message = Message::new("42", "agua subindo rua X", "2024-01-10T10:00:00Z");
    let prompt = build_prompt(&message);

    assert!(prompt.contains("agua subindo rua X"));
    assert!(prompt.contains("report"));
    assert!(prompt.contains("comment"));
}
