use sybil_orm::ir::{Bundle, SchemaDocument};
use sybil_orm::refs::{allocate_references, duplicate_references, remove_references, REFERENCE_LEN};

fn document(text: &str) -> SchemaDocument {
    let bundle: Bundle = toml::from_str(text).unwrap();
    let mut doc = SchemaDocument::new();
    doc.insert_bundle("index", bundle);
    doc
}

fn all_references(doc: &SchemaDocument) -> Vec<String> {
    let mut refs = Vec::new();
    for (_, _, entity) in doc.entities() {
        refs.extend(entity.reference().map(str::to_string));
        for column in entity.columns.values() {
            refs.extend(column.reference().map(str::to_string));
        }
    }
    refs
}

#[test]
fn allocation_fills_missing_references_once() {
    let mut doc = document(
        r#"
[article]
_params = { _ref = "0badc0de" }
id = { type = "integer", identifier = true, _ref = "00000001" }
title = { type = "string" }
"#,
    );

    assert_eq!(allocate_references(&mut doc), 1);
    assert!(doc.dirty);

    let article = doc.entity("index", "article").unwrap();
    assert_eq!(article.reference(), Some("0badc0de"));
    assert_eq!(article.columns["id"].reference(), Some("00000001"));
    let title_ref = article.columns["title"].reference().unwrap().to_string();
    assert_eq!(title_ref.len(), REFERENCE_LEN);
    assert!(title_ref.chars().all(|c| c.is_ascii_hexdigit()));

    doc.dirty = false;
    let before = all_references(&doc);
    assert_eq!(allocate_references(&mut doc), 0);
    assert!(!doc.dirty);
    assert_eq!(all_references(&doc), before);
}

#[test]
fn allocated_references_are_distinct() {
    let mut doc = document(
        r#"
[a]
id = { identifier = true }
x = {}
y = {}

[b]
id = { identifier = true }
z = {}
"#,
    );
    assert_eq!(allocate_references(&mut doc), 7);
    let refs = all_references(&doc);
    let unique: std::collections::HashSet<_> = refs.iter().collect();
    assert_eq!(unique.len(), refs.len());
}

#[test]
fn removal_strips_references_and_empty_params() {
    let mut doc = document(
        r#"
[article]
_params = { _ref = "0badc0de" }
id = { type = "integer", identifier = true, _ref = "00000001" }

[tag]
_params = { alias = "tags", _ref = "0badf00d" }
id = { type = "integer", identifier = true, _ref = "00000002" }
"#,
    );
    assert_eq!(remove_references(&mut doc), 4);
    assert!(doc.dirty);
    assert!(all_references(&doc).is_empty());
    assert!(doc.entity("index", "article").unwrap().params.is_none());
    let tag = doc.entity("index", "tag").unwrap();
    assert_eq!(tag.table_name("tag"), "tags");
}

#[test]
fn duplicated_references_are_reported() {
    let doc = document(
        r#"
[article]
_params = { _ref = "aaaaaaaa" }
id = { identifier = true, _ref = "00000001" }
title = { _ref = "00000001" }

[tag]
_params = { _ref = "aaaaaaaa" }
id = { identifier = true, _ref = "00000001" }
"#,
    );
    let errors = duplicate_references(&doc);
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("article.title"));
    assert!(errors[1].contains("tag"));
}
