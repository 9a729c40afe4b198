//! Integration tests for the message store

use std::fs;

use flood_monitor::schema::messages;
use flood_monitor::search::SearchResponse;
use flood_monitor::{Classification, Message, MessageStore, ParsedReply};
use proptest::prelude::*;
use tempfile::tempdir;

fn sample_messages() -> Vec<Message> {
    vec![
        Message::new("42", "agua subindo rua X", "2024-01-10T10:00:00Z"),
        Message::new("7", "que chuva", "2024-01-10T11:00:00Z"),
        Message::new("1234567890123456789", "rio transbordou no Centro", "2024-01-11T08:30:00Z"),
    ]
}

#[test]
fn test_open_bootstraps_empty_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("messages.csv");

    let store = MessageStore::open(&path).unwrap();

    assert!(store.is_empty());
    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents.trim_end(), messages::HEADER.join(","));
}

#[test]
fn test_open_existing_table_is_not_reset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.csv");
    {
        let mut store = MessageStore::open(&path).unwrap();
        store.merge_ingested(sample_messages()).unwrap();
    }

    let store = MessageStore::open(&path).unwrap();
    assert_eq!(store.len(), 3);
}

#[test]
fn test_merge_is_idempotent() {
    let dir = tempdir().unwrap();
    let mut store = MessageStore::open(dir.path().join("messages.csv")).unwrap();

    assert_eq!(store.merge_ingested(sample_messages()).unwrap(), 3);
    assert_eq!(store.merge_ingested(sample_messages()).unwrap(), 0);
    assert_eq!(store.len(), 3);
}

#[test]
fn test_merge_dedups_within_batch() {
    let dir = tempdir().unwrap();
    let mut store = MessageStore::open(dir.path().join("messages.csv")).unwrap();

    let message = Message::new("42", "agua subindo rua X", "2024-01-10T10:00:00Z");
    let added = store
        .merge_ingested(vec![message.clone(), message.clone(), message])
        .unwrap();

    assert_eq!(added, 1);
}

#[test]
fn test_same_text_different_time_is_distinct() {
    let dir = tempdir().unwrap();
    let mut store = MessageStore::open(dir.path().join("messages.csv")).unwrap();

    let added = store
        .merge_ingested(vec![
            Message::new("42", "alagou", "2024-01-10T10:00:00Z"),
            Message::new("42", "alagou", "2024-01-10T10:05:00Z"),
            Message::new("43", "alagou", "2024-01-10T10:00:00Z"),
        ])
        .unwrap();

    assert_eq!(added, 3);
}

#[test]
fn test_merge_forces_unset_classification() {
    let dir = tempdir().unwrap();
    let mut store = MessageStore::open(dir.path().join("messages.csv")).unwrap();

    let mut message = Message::new("42", "agua subindo rua X", "2024-01-10T10:00:00Z");
    message.classification = Classification::Report {
        location: "Rua X".to_string(),
    };
    store.merge_ingested(vec![message.clone()]).unwrap();

    let stored = store.get(&message.key()).unwrap();
    assert!(stored.classification.is_unset());
    assert_eq!(stored.location(), "");
}

#[test]
fn test_merge_without_new_rows_does_not_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.csv");
    let mut store = MessageStore::open(&path).unwrap();
    store.merge_ingested(sample_messages()).unwrap();

    // Hand edit survives because a no-op merge must not rewrite the file
    let marker = "\n# untouched";
    let mut contents = fs::read_to_string(&path).unwrap();
    contents.push_str(marker);
    fs::write(&path, &contents).unwrap();

    assert_eq!(store.merge_ingested(sample_messages()).unwrap(), 0);
    assert!(fs::read_to_string(&path).unwrap().ends_with(marker));
}

#[test]
fn test_reload_preserves_identity_fields_as_text() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.csv");
    {
        let mut store = MessageStore::open(&path).unwrap();
        store
            .merge_ingested(vec![
                Message::new("1234567890123456789", "rua alagada", "2024-01-10T10:00:00Z"),
                Message::new("007", "texto, com \"aspas\"\ne quebra", "2024-01-10 10:00:00"),
            ])
            .unwrap();
    }

    let mut store = MessageStore::open(&path).unwrap();
    let authors: Vec<_> = store.messages().iter().map(|m| m.author_id.as_str()).collect();
    assert_eq!(authors, vec!["1234567890123456789", "007"]);
    assert_eq!(store.messages()[1].text, "texto, com \"aspas\"\ne quebra");

    // Re-ingesting the reloaded rows must still dedup
    let again = vec![
        Message::new("1234567890123456789", "rua alagada", "2024-01-10T10:00:00Z"),
        Message::new("007", "texto, com \"aspas\"\ne quebra", "2024-01-10 10:00:00"),
    ];
    assert_eq!(store.merge_ingested(again).unwrap(), 0);
}

#[test]
fn test_unclassified_excludes_classified_rows() {
    let dir = tempdir().unwrap();
    let mut store = MessageStore::open(dir.path().join("messages.csv")).unwrap();
    let batch = sample_messages();
    store.merge_ingested(batch.clone()).unwrap();

    store
        .update_classification(
            &batch[0].key(),
            ParsedReply::Report {
                location: "Rua X".to_string(),
            },
        )
        .unwrap();
    store.update_classification(&batch[1].key(), ParsedReply::Comment).unwrap();

    let pending = store.unclassified();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key(), batch[2].key());
}

#[test]
fn test_classification_survives_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.csv");
    let batch = sample_messages();
    {
        let mut store = MessageStore::open(&path).unwrap();
        store.merge_ingested(batch.clone()).unwrap();
        store
            .update_classification(
                &batch[0].key(),
                ParsedReply::Report {
                    location: "Rua X".to_string(),
                },
            )
            .unwrap();
        store.update_classification(&batch[1].key(), ParsedReply::Comment).unwrap();
        store.persist().unwrap();
        assert_eq!(store.pending_updates(), 0);
    }

    let store = MessageStore::open(&path).unwrap();
    assert_eq!(
        store.get(&batch[0].key()).unwrap().classification,
        Classification::Report {
            location: "Rua X".to_string()
        }
    );
    assert_eq!(store.get(&batch[1].key()).unwrap().classification, Classification::Comment);
    assert!(store.get(&batch[2].key()).unwrap().classification.is_unset());
}

#[test]
fn test_columns_are_matched_by_name() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.csv");
    fs::write(
        &path,
        "location,classification,date,message,user\n\
         Centro,report,2024-01-10T10:00:00Z,rio subiu,99\n",
    )
    .unwrap();

    let store = MessageStore::open(&path).unwrap();
    let message = &store.messages()[0];
    assert_eq!(message.author_id, "99");
    assert_eq!(message.text, "rio subiu");
    assert_eq!(message.location(), "Centro");
}

#[test]
fn test_missing_column_is_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.csv");
    fs::write(&path, "user,message,date\n1,a,2024-01-10\n").unwrap();

    let err = MessageStore::open(&path).unwrap_err();
    assert!(err.is_persistence());
}

#[test]
fn test_unset_rows_never_carry_location() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.csv");
    fs::write(
        &path,
        "user,message,date,classification,location\n\
         1,a,2024-01-10,,Centro\n\
         2,b,2024-01-10,comment,Centro\n",
    )
    .unwrap();

    let store = MessageStore::open(&path).unwrap();
    for message in store.messages() {
        if !matches!(message.classification, Classification::Report { .. }) {
            assert_eq!(message.location(), "");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_merge_twice_adds_nothing(
        rows in prop::collection::vec(("[0-9]{1,19}", "[a-z ]{0,20}", 0u32..5), 0..12)
    ) {
        let dir = tempdir().unwrap();
        let mut store = MessageStore::open(dir.path().join("messages.csv")).unwrap();
        let batch: Vec<Message> = rows
            .iter()
            .map(|(author, text, hour)| Message::new(author.as_str(), text.as_str(), format!("2024-01-10T0{hour}:00:00Z")))
            .collect();

        let first = store.merge_ingested(batch.clone()).unwrap();
        let second = store.merge_ingested(batch).unwrap();

        prop_assert_eq!(second, 0);
        prop_assert_eq!(first, store.len());
    }
}

#[test]
fn test_rows_from_existing_table_match_fresh_search_results() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("messages.csv");
    fs::write(
        &path,
        "user,message,date,classification,location\n\
         42,agua  subindo  rua X ,2024-01-10T10:00:00.000Z,comment,\n\
         7,rio subiu na ponte,2024-01-10T11:00:00.000Z,,\n",
    )
    .unwrap();

    let response: SearchResponse = serde_json::from_str(
        r#"{"data": [
            {"id": "1", "text": "agua  subindo  rua X ", "author_id": "42", "created_at": "2024-01-10T10:00:00.000Z"},
            {"id": "2", "text": "rio subiu\nna ponte", "author_id": "7", "created_at": "2024-01-10T11:00:00.000Z"}
        ]}"#,
    )
    .unwrap();

    let mut store = MessageStore::open(&path).unwrap();
    let added = store.merge_ingested(response.into_messages()).unwrap();

    assert_eq!(added, 0);
    assert_eq!(store.len(), 2);
    assert_eq!(store.messages()[0].classification, Classification::Comment);
}
