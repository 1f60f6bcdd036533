//! Tests for conversation snapshots

use chat_core::{Message, MessageStatus};
use conversation_tree::{Conversation, MessageStore, TreeError};
use uuid::Uuid;

#[test]
fn test_conversation_round_trip_keeps_ids_and_path() {
    let mut conversation = Conversation::default();
    let user = conversation.push_message(Message::user("hi", None)).unwrap();
    let reply = conversation
        .push_message(Message::assistant("hello", Some(user)).with_reasoning("greeting"))
        .unwrap();
    let _alternative = conversation
        .add_message(Message::assistant("hey", Some(user)))
        .unwrap();

    let json = serde_json::to_string(&conversation).unwrap();
    let restored: Conversation = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.id, conversation.id);
    assert_eq!(restored.active_path(), &[user, reply]);
    assert_eq!(restored.len(), 3);
    assert_eq!(
        restored.get(&reply).unwrap().reasoning.as_deref(),
        Some("greeting")
    );
    assert!(!restored.is_dirty());
}

#[test]
fn test_store_serializes_in_insertion_order() {
    let mut store = MessageStore::new();
    let a = store.insert(Message::user("a", None)).unwrap();
    let b = store.insert(Message::assistant("b", Some(a))).unwrap();

    let value = serde_json::to_value(&store).unwrap();
    let ids: Vec<String> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![a.to_string(), b.to_string()]);
}

#[test]
fn test_dangling_parent_is_rejected_on_load() {
    let orphan = Message::user("orphan", Some(Uuid::new_v4()));
    let json = serde_json::to_string(&vec![orphan]).unwrap();

    let result = serde_json::from_str::<MessageStore>(&json);
    assert!(result.is_err());
}

#[test]
fn test_duplicate_ids_rejected() {
    let message = Message::user("hi", None);
    let result = MessageStore::from_messages(vec![message.clone(), message.clone()]);
    assert_eq!(result, Err(TreeError::DuplicateId(message.id)));
}

#[test]
fn test_stale_active_path_is_truncated_on_load() {
    let mut conversation = Conversation::default();
    let user = conversation.push_message(Message::user("hi", None)).unwrap();
    let mut value = serde_json::to_value(&conversation).unwrap();
    value["active_path"] = serde_json::json!([user.to_string(), Uuid::new_v4().to_string()]);

    let restored: Conversation = serde_json::from_value(value).unwrap();
    assert_eq!(restored.active_path(), &[user]);
}

#[test]
fn test_pending_placeholder_survives_round_trip() {
    let mut conversation = Conversation::default();
    let user = conversation.push_message(Message::user("hi", None)).unwrap();
    let placeholder = conversation
        .push_message(Message::placeholder(Some(user)))
        .unwrap();

    let json = serde_json::to_string(&conversation).unwrap();
    let mut restored: Conversation = serde_json::from_str(&json).unwrap();
    assert_eq!(
        restored.get(&placeholder).unwrap().status,
        MessageStatus::Pending
    );

    restored
        .finalize_message(&placeholder, "done".to_string(), None, MessageStatus::Complete)
        .unwrap();
    assert_eq!(restored.get(&placeholder).unwrap().content, "done");
}
