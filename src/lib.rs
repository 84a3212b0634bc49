pub mod codegen;
pub mod config;
pub mod ddl;
pub mod diff;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod ir;
pub mod live;
pub mod plan;
pub mod refs;
pub mod resolve;
pub mod types;

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

pub use config::Settings;
pub use diff::SchemaDiff;
pub use error::{Error, Result};
pub use ir::{Bundle, SchemaDocument};
pub use live::LiveSchema;
pub use plan::{MigrationPlan, Phase};
pub use resolve::{ConsoleResolver, Resolver, ScriptedResolver};

/// Read one bundle schema document. An empty file is an empty bundle.
pub fn load_bundle(path: &Path) -> Result<Bundle> {
    let text = fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|source| Error::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Load the schema document of every bundle directory under
/// `settings.bundle_dir`, in directory name order. Bundles without a
/// schema document are skipped.
pub fn load_schemas(settings: &Settings) -> Result<SchemaDocument> {
    let mut doc = SchemaDocument::new();
    if !settings.bundle_dir.is_dir() {
        warn!(dir = %settings.bundle_dir.display(), "bundle directory not found");
        return Ok(doc);
    }

    let mut bundles: Vec<String> = fs::read_dir(&settings.bundle_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    bundles.sort();

    for bundle in bundles {
        let path = settings.schema_path(&bundle);
        if !path.is_file() {
            continue;
        }
        let entities = load_bundle(&path)?;
        debug!(bundle = %bundle, entities = entities.len(), "loaded schema");
        doc.insert_bundle(bundle, entities);
    }
    Ok(doc)
}

fn write_bundle(path: &Path, bundle: &Bundle) -> Result<()> {
    let text = toml::to_string(bundle)?;
    fs::write(path, text)?;
    Ok(())
}

/// Write every bundle document back, keeping the previous version of each
/// next to it as the backup file. Clears the dirty flag.
pub fn write_schemas(doc: &mut SchemaDocument, settings: &Settings) -> Result<()> {
    for (bundle, entities) in &doc.bundles {
        let path = settings.schema_path(bundle);
        if path.is_file() {
            fs::copy(&path, settings.backup_path(bundle))?;
        } else if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_bundle(&path, entities)?;
        info!(path = %path.display(), "schema written");
    }
    doc.dirty = false;
    Ok(())
}

/// Problems that make the schema unusable. Nothing is sent to the database
/// while any remain.
pub fn lint_schema(doc: &SchemaDocument) -> Vec<String> {
    let mut errors = Vec::new();

    for (bundle, name, entity) in doc.entities() {
        if entity.columns.is_empty() {
            errors.push(format!("Entity {}.{} declares no columns", bundle, name));
            continue;
        }
        if entity.identifier_columns().is_empty() {
            errors.push(format!(
                "Entity {}.{} has no identifier column",
                bundle, name
            ));
        }
        for (column, spec) in &entity.columns {
            if let Some(fk) = &spec.index_of {
                match ddl::resolve_foreign_key(doc, bundle, fk) {
                    Ok(_) => {}
                    Err(Error::Authoring(reason)) => {
                        errors.push(format!("Column {}.{}.{}: {}", bundle, name, column, reason))
                    }
                    Err(e) => errors.push(format!("Column {}.{}.{}: {}", bundle, name, column, e)),
                }
            }
        }
    }

    let mut tables: std::collections::HashMap<&str, (&str, &str)> =
        std::collections::HashMap::new();
    for (bundle, name, entity) in doc.entities() {
        let table = entity.table_name(name);
        if let Some((other_bundle, other)) = tables.insert(table, (bundle, name)) {
            errors.push(format!(
                "Entities {}.{} and {}.{} share the table name {}",
                other_bundle, other, bundle, name, table
            ));
        }
    }

    errors.extend(refs::duplicate_references(doc));
    errors
}

/// Load, validate and give every entity and column a reference.
pub fn prepare(settings: &Settings) -> Result<SchemaDocument> {
    let mut doc = load_schemas(settings)?;
    let errors = lint_schema(&doc);
    if !errors.is_empty() {
        return Err(Error::Authoring(errors.join("\n")));
    }
    let allocated = refs::allocate_references(&mut doc);
    if allocated > 0 {
        info!(allocated, "allocated references");
    }
    Ok(doc)
}

/// Diff the prepared document against `live` and settle every pending
/// decision through `resolver`.
pub fn plan_update(
    doc: &SchemaDocument,
    live: &LiveSchema,
    resolver: &mut dyn Resolver,
) -> Result<(SchemaDiff, MigrationPlan)> {
    let diff = SchemaDiff::compute(doc, live);
    let plan = plan::plan(doc, live, &diff, resolver)?;
    Ok((diff, plan))
}

/// Outcome of [`update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub plan: MigrationPlan,
    pub executed: usize,
    pub documents_written: bool,
}

/// Bring the database in line with the bundle schemas, then persist any
/// references allocated along the way.
pub async fn update(settings: &Settings, resolver: &mut dyn Resolver) -> Result<UpdateReport> {
    let mut doc = prepare(settings)?;
    let introspector = introspect::Introspector::connect(settings).await?;
    let live = introspector.snapshot().await?;
    let (_, plan) = plan_update(&doc, &live, resolver)?;

    let mut executed = 0;
    if plan.is_empty() {
        info!("database schema is up to date");
    } else {
        println!("{}", plan.render());
        let executor = executor::Executor::new(introspector.pool().clone());
        executed = executor.execute(&plan).await?;
        info!(executed, "database schema updated");
    }

    let documents_written = doc.dirty;
    if doc.dirty {
        write_schemas(&mut doc, settings)?;
    }
    Ok(UpdateReport {
        plan,
        executed,
        documents_written,
    })
}

/// Same as [`update`] up to the plan; nothing is executed or written.
pub async fn plan_only(settings: &Settings, resolver: &mut dyn Resolver) -> Result<MigrationPlan> {
    let doc = prepare(settings)?;
    let introspector = introspect::Introspector::connect(settings).await?;
    let live = introspector.snapshot().await?;
    let (_, plan) = plan_update(&doc, &live, resolver)?;
    Ok(plan)
}

/// Strip every reference from the bundle documents and delete their
/// backups. Returns the number of references removed.
pub fn reset_references(settings: &Settings) -> Result<usize> {
    let mut doc = load_schemas(settings)?;
    let removed = refs::remove_references(&mut doc);
    for (bundle, entities) in &doc.bundles {
        write_bundle(&settings.schema_path(bundle), entities)?;
        let backup = settings.backup_path(bundle);
        if backup.is_file() {
            fs::remove_file(&backup)?;
        }
    }
    info!(removed, "references removed");
    Ok(removed)
}

/// Describe live tables as a bundle document: `table` alone, or every
/// table of the database.
pub async fn dump(settings: &Settings, table: Option<&str>) -> Result<String> {
    let introspector = introspect::Introspector::connect(settings).await?;
    let mut bundle = Bundle::new();
    match table {
        Some(table) => {
            let entity = introspector
                .dump_table(table)
                .await?
                .ok_or_else(|| Error::Config(format!("table {} does not exist", table)))?;
            bundle.insert(table.to_string(), entity);
        }
        None => {
            for live_table in introspector.snapshot().await?.tables {
                bundle.insert(
                    live_table.name.clone(),
                    introspect::entity_from_live(&live_table),
                );
            }
        }
    }
    Ok(toml::to_string(&bundle)?)
}
