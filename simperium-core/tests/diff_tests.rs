use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use simperium_core::{encode_create, Change, ChangeRecord, Diff, FieldOp, Operation};

#[test]
fn create_diff_adds_every_field_in_order() {
    let doc = json!({"zeta": 1, "alpha": {"nested": true}, "mid": [1, 2]});
    let diff = encode_create(doc.as_object().unwrap());

    let fields: Vec<&str> = diff.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(fields, vec!["zeta", "alpha", "mid"]);
    assert!(diff.iter().all(|d| matches!(d.op, FieldOp::Add(_))));

    let rendered = serde_json::to_string(&diff).unwrap();
    assert_eq!(
        rendered,
        r#"{"zeta":{"o":"+","v":1},"alpha":{"o":"+","v":{"nested":true}},"mid":{"o":"+","v":[1,2]}}"#
    );
}

#[test]
fn empty_document_gives_empty_diff() {
    let diff = encode_create(&Map::new());
    assert!(diff.is_empty());
    assert_eq!(serde_json::to_value(&diff).unwrap(), json!({}));
}

#[test]
fn hand_built_diff_mixes_ops() {
    let mut diff = Diff::new();
    diff.push("title", FieldOp::Replace(json!("new")));
    diff.push("draft", FieldOp::Remove);
    diff.push("tags", FieldOp::Add(json!(["a"])));

    assert_eq!(diff.len(), 3);
    assert_eq!(
        serde_json::to_value(&diff).unwrap(),
        json!({
            "title": {"o": "r", "v": "new"},
            "draft": {"o": "-"},
            "tags": {"o": "+", "v": ["a"]}
        })
    );
}

#[test]
fn change_record_wire_shape() {
    let doc = json!({"x": 1});
    let record = ChangeRecord::modify("item1", encode_create(doc.as_object().unwrap()));
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["id"], "item1");
    assert_eq!(value["o"], "M");
    assert_eq!(value["v"], json!({"x": {"o": "+", "v": 1}}));
    assert_eq!(value["ccid"].as_str().unwrap().len(), 32);
    assert!(value.get("sv").is_none());

    let versioned = record.with_source_version(4);
    assert_eq!(serde_json::to_value(&versioned).unwrap()["sv"], 4);
}

#[test]
fn each_record_gets_its_own_ccid() {
    let a = ChangeRecord::modify("a", Diff::new());
    let b = ChangeRecord::modify("a", Diff::new());
    assert_ne!(a.ccid, b.ccid);
}

#[test]
fn change_keeps_unknown_fields() {
    let change: Change = serde_json::from_value(json!({
        "id": "doc1",
        "o": "M",
        "cv": "cv9",
        "ccids": ["c1", "c2"],
        "username": "alice",
        "d": {"n": 1},
        "future_field": 7
    }))
    .unwrap();

    assert_eq!(change.o, Operation::Modify);
    assert_eq!(change.username.as_deref(), Some("alice"));
    assert_eq!(change.d, Some(json!({"n": 1})));
    assert_eq!(change.ccids.len(), 2);
    assert_eq!(change.extra.get("future_field"), Some(&json!(7)));
    assert!(!change.is_error());
}

#[test]
fn change_defaults_missing_operation_to_modify() {
    let change: Change = serde_json::from_value(json!({"id": "doc1", "error": 412})).unwrap();
    assert_eq!(change.o, Operation::Modify);
    assert!(change.is_error());
    assert!(change.cv.is_none());
}

fn field_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,12}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn create_diff_mirrors_document(fields in prop::collection::vec((field_name(), leaf()), 0..12)) {
        let mut doc = Map::new();
        for (k, v) in fields {
            doc.insert(k, v);
        }

        let diff = encode_create(&doc);
        prop_assert_eq!(diff.len(), doc.len());

        for (entry, (field, value)) in diff.iter().zip(doc.iter()) {
            prop_assert_eq!(&entry.field, field);
            prop_assert_eq!(&entry.op, &FieldOp::Add(value.clone()));
        }

        let rendered = serde_json::to_value(&diff).unwrap();
        let rendered = rendered.as_object().unwrap();
        let keys: Vec<&String> = rendered.keys().collect();
        let expected: Vec<&String> = doc.keys().collect();
        prop_assert_eq!(keys, expected);
        for (field, op) in rendered {
            prop_assert_eq!(&op["o"], "+");
            prop_assert_eq!(&op["v"], &doc[field]);
        }
    }
}
