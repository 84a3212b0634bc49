//! Requires a scratch MySQL database in `DATABASE_URL`. Every table in it
//! is dropped.

use std::fs;
use std::path::Path;

use sqlx::mysql::MySqlPool;
use sybil_orm::introspect::Introspector;
use sybil_orm::{dump, load_schemas, update, ScriptedResolver, Settings};
use tempfile::TempDir;

fn write_bundle(dir: &Path, bundle: &str, text: &str) {
    let bundle_dir = dir.join(bundle);
    fs::create_dir_all(&bundle_dir).unwrap();
    fs::write(bundle_dir.join("schema.toml"), text).unwrap();
}

async fn scratch(dir: &Path) -> (Settings, MySqlPool) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
    let settings = Settings {
        database_url: Some(url.clone()),
        bundle_dir: dir.to_path_buf(),
        ..Settings::default()
    };
    let pool = MySqlPool::connect(&url).await.unwrap();
    sqlx::query("SET FOREIGN_KEY_CHECKS = 0").execute(&pool).await.unwrap();
    for (name, _) in Introspector::new(pool.clone()).tables().await.unwrap() {
        sqlx::query(&format!("DROP TABLE `{}`", name))
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query("SET FOREIGN_KEY_CHECKS = 1").execute(&pool).await.unwrap();
    (settings, pool)
}

#[tokio::test]
#[ignore]
async fn update_creates_renames_and_converges() {
    let dir = TempDir::new().unwrap();
    let (settings, pool) = scratch(dir.path()).await;

    write_bundle(
        dir.path(),
        "user",
        r#"
[user]
id = { type = "integer", length = 9, identifier = true, auto = true }
login = { type = "string", length = 64, nullable = false }
"#,
    );
    write_bundle(
        dir.path(),
        "index",
        r#"
[article]
id = { type = "integer", identifier = true, auto = true }
title = { type = "string", length = 120 }
author = { indexOf = { bundle = "user", model = "user", delete = "cascade" } }
"#,
    );

    let mut resolver = ScriptedResolver::default();
    let report = update(&settings, &mut resolver).await.unwrap();
    assert!(report.documents_written);
    assert_eq!(report.executed, 4);
    assert!(resolver.asked.is_empty());

    let introspector = Introspector::new(pool.clone());
    let live = introspector.snapshot().await.unwrap();
    let article = live.table("article").unwrap();
    // MySQL 8 reports integers without a display width
    let author_type = &article.column("author").unwrap().column_type;
    assert!(matches!(author_type.as_str(), "int(9)" | "int"), "{author_type}");
    assert_eq!(article.foreign_keys.len(), 1);
    assert_eq!(article.foreign_keys[0].delete_rule, "CASCADE");

    // second run has nothing to do
    let report = update(&settings, &mut resolver).await.unwrap();
    assert!(report.plan.is_empty());
    assert!(!report.documents_written);

    // rename the entity and a column; references carry the rename
    let doc = load_schemas(&settings).unwrap();
    let text = fs::read_to_string(settings.schema_path("index"))
        .unwrap()
        .replace("[article", "[post")
        .replace("[post.title", "[post.headline");
    fs::write(settings.schema_path("index"), text).unwrap();
    assert!(doc.entity("index", "article").is_some());

    let report = update(&settings, &mut resolver).await.unwrap();
    assert!(resolver.asked.is_empty());
    let statements: Vec<&str> = report.plan.iter().collect();
    assert_eq!(statements[0], "RENAME TABLE `article` TO `post`;");
    assert!(statements[1].starts_with("ALTER TABLE `post` CHANGE COLUMN `title` `headline`"));

    let live = introspector.snapshot().await.unwrap();
    assert!(live.table("article").is_none());
    assert!(live.table("post").unwrap().column("headline").is_some());

    let dumped = dump(&settings, Some("post")).await.unwrap();
    assert!(dumped.contains("[post.headline]"));
}

#[tokio::test]
#[ignore]
async fn orphan_table_is_kept_without_confirmation() {
    let dir = TempDir::new().unwrap();
    let (settings, pool) = scratch(dir.path()).await;
    sqlx::query("CREATE TABLE legacy (id int(11) NOT NULL PRIMARY KEY)")
        .execute(&pool)
        .await
        .unwrap();
    write_bundle(
        dir.path(),
        "index",
        "[tag]\nid = { type = \"integer\", identifier = true }\n",
    );

    let mut resolver = ScriptedResolver::new(["n"]);
    update(&settings, &mut resolver).await.unwrap();
    assert_eq!(resolver.asked.len(), 1);

    let live = Introspector::new(pool).snapshot().await.unwrap();
    assert!(live.table("legacy").is_some());
    assert!(live.table("tag").is_some());
}
