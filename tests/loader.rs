use std::fs;
use std::path::Path;

use sybil_orm::{
    lint_schema, load_bundle, load_schemas, prepare, reset_references, write_schemas, Error,
    Settings,
};
use tempfile::TempDir;

fn settings_in(dir: &Path) -> Settings {
    Settings {
        bundle_dir: dir.to_path_buf(),
        ..Settings::default()
    }
}

fn write_bundle(dir: &Path, bundle: &str, text: &str) {
    let bundle_dir = dir.join(bundle);
    fs::create_dir_all(&bundle_dir).unwrap();
    fs::write(bundle_dir.join("schema.toml"), text).unwrap();
}

const INDEX: &str = r#"
[article]
id = { type = "integer", identifier = true, auto = true }
title = { type = "string", length = 120 }
author = { indexOf = { bundle = "user", model = "user" } }
"#;

const USER: &str = r#"
[user]
id = { type = "integer", length = 9, identifier = true, auto = true }
"#;

#[test]
fn bundles_load_in_directory_order_and_keep_column_order() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path(), "user", USER);
    write_bundle(dir.path(), "index", INDEX);
    fs::create_dir_all(dir.path().join("empty")).unwrap();

    let doc = load_schemas(&settings_in(dir.path())).unwrap();
    let bundles: Vec<&str> = doc.bundles.keys().map(String::as_str).collect();
    assert_eq!(bundles, ["index", "user"]);

    let article = doc.entity("index", "article").unwrap();
    let columns: Vec<&str> = article.columns.keys().map(String::as_str).collect();
    assert_eq!(columns, ["id", "title", "author"]);
    assert!(!doc.dirty);
}

#[test]
fn missing_bundle_directory_is_an_empty_schema() {
    let dir = TempDir::new().unwrap();
    let doc = load_schemas(&settings_in(&dir.path().join("nowhere"))).unwrap();
    assert!(doc.bundles.is_empty());
}

#[test]
fn malformed_document_names_its_path() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path(), "index", "[article\nid = 1");
    let err = load_schemas(&settings_in(dir.path())).unwrap_err();
    match err {
        Error::Parse { path, .. } => assert!(path.ends_with("schema.toml")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn prepared_references_survive_a_write_and_reload() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path(), "index", INDEX);
    write_bundle(dir.path(), "user", USER);
    let settings = settings_in(dir.path());

    let mut doc = prepare(&settings).unwrap();
    assert!(doc.dirty);
    write_schemas(&mut doc, &settings).unwrap();
    assert!(!doc.dirty);

    let backup = fs::read_to_string(settings.backup_path("index")).unwrap();
    assert_eq!(backup, INDEX);

    let reloaded = load_schemas(&settings).unwrap();
    let before = doc.entity("index", "article").unwrap();
    let after = reloaded.entity("index", "article").unwrap();
    assert_eq!(before, after);
    assert!(after.reference().is_some());
    assert!(after.columns.values().all(|c| c.reference().is_some()));

    // nothing left to allocate on the second run
    let again = prepare(&settings).unwrap();
    assert!(!again.dirty);
}

#[test]
fn reset_strips_references_and_backups() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path(), "index", INDEX);
    write_bundle(dir.path(), "user", USER);
    let settings = settings_in(dir.path());

    let mut doc = prepare(&settings).unwrap();
    write_schemas(&mut doc, &settings).unwrap();
    assert!(settings.backup_path("user").exists());

    assert_eq!(reset_references(&settings).unwrap(), 6);
    assert!(!settings.backup_path("user").exists());
    let bundle = load_bundle(&settings.schema_path("index")).unwrap();
    let article = &bundle["article"];
    assert!(article.params.is_none());
    assert!(article.columns.values().all(|c| c.reference.is_none()));
}

#[test]
fn lint_reports_unusable_entities() {
    let dir = TempDir::new().unwrap();
    write_bundle(
        dir.path(),
        "index",
        r#"
[article]
title = { type = "string" }
author = { indexOf = { model = "user" } }

[draft]
_params = { alias = "article" }
id = { identifier = true }
"#,
    );
    let settings = settings_in(dir.path());
    let doc = load_schemas(&settings).unwrap();

    let errors = lint_schema(&doc);
    assert_eq!(errors.len(), 3, "{errors:?}");
    assert_eq!(errors[0], "Entity index.article has no identifier column");
    assert!(errors[1].starts_with("Column index.article.author:"));
    assert!(errors[2].contains("share the table name article"));

    let err = prepare(&settings).unwrap_err();
    assert!(matches!(err, Error::Authoring(_)));
}

#[test]
fn sample_bundles_are_valid() {
    let doc = load_schemas(&settings_in(Path::new("bundle"))).unwrap();
    assert!(doc.entity("index", "article").is_some());
    assert!(doc.entity("user", "role").is_some());
    assert_eq!(lint_schema(&doc), Vec::<String>::new());
}

#[test]
fn settings_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sybil.toml");
    fs::write(&path, "bundle_dir = \"schemas\"\nbackup_file = \"schema.bak\"\n").unwrap();

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.bundle_dir, Path::new("schemas"));
    assert_eq!(settings.schema_path("index"), Path::new("schemas/index/schema.toml"));
    assert_eq!(settings.backup_path("index"), Path::new("schemas/index/schema.bak"));

    let bare = Settings {
        database_url: Some("postgres://localhost/db".into()),
        ..Settings::default()
    };
    assert!(matches!(bare.database_url(), Err(Error::Config(_))));
}
