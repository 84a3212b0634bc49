use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sybil_orm::{codegen, ConsoleResolver, Settings};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = "sybil.toml")]
    config: PathBuf,
    /// Database url, overriding the settings file and DATABASE_URL
    #[arg(long, global = true)]
    url: Option<String>,
    /// Directory holding the bundle directories
    #[arg(long, global = true)]
    bundles: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile bundle schemas with the database
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Generate Rust model structs from the bundle schemas
    Models {
        /// Directory to write the generated modules to
        #[arg(long, default_value = "generated/models")]
        out: PathBuf,
    },
    /// Check the bundle schemas without touching the database
    Lint,
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Apply the bundle schemas to the database
    Update,
    /// Print the statements an update would run, without running them
    Plan,
    /// Remove every reference from the bundle schemas
    Reset,
    /// Print live tables in the schema document format
    Dump {
        /// Only this table
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to read settings {}", cli.config.display()))?;
    if let Some(url) = cli.url {
        settings.database_url = Some(url);
    }
    if let Some(dir) = cli.bundles {
        settings.bundle_dir = dir;
    }

    match cli.command {
        Commands::Schema {
            command: SchemaCommands::Update,
        } => {
            let mut resolver = ConsoleResolver::stdio();
            let report = sybil_orm::update(&settings, &mut resolver).await?;
            if report.plan.is_empty() {
                println!("Database schema is up to date");
            } else {
                println!("Database schema updated ({} statements)", report.executed);
            }
        }
        Commands::Schema {
            command: SchemaCommands::Plan,
        } => {
            let mut resolver = ConsoleResolver::stdio();
            let plan = sybil_orm::plan_only(&settings, &mut resolver).await?;
            if plan.is_empty() {
                println!("Database schema is up to date");
            } else {
                print!("{}", plan.render());
            }
        }
        Commands::Schema {
            command: SchemaCommands::Reset,
        } => {
            let removed = sybil_orm::reset_references(&settings)?;
            println!("Removed {} references", removed);
        }
        Commands::Schema {
            command: SchemaCommands::Dump { table },
        } => {
            let text = sybil_orm::dump(&settings, table.as_deref()).await?;
            println!("{}", text);
        }
        Commands::Models { out } => {
            let doc = sybil_orm::load_schemas(&settings)?;
            let written = codegen::write_models(&doc, &out)?;
            println!("Wrote {} files to {}", written.len(), out.display());
        }
        Commands::Lint => {
            let doc = sybil_orm::load_schemas(&settings)?;
            let errors = sybil_orm::lint_schema(&doc);
            if errors.is_empty() {
                println!("Schema lint passed");
            } else {
                for e in &errors {
                    eprintln!("{}", e);
                }
                anyhow::bail!("Schema lint failed");
            }
        }
    }
    Ok(())
}
