//! oxide-schema CLI
//!
//! Compares declared tables with a PostgreSQL database and patches it.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_schema::policy::AutoCreate;
use oxide_schema_postgres::{
    load_tables, MigrationPlan, MigratorOptions, PgDdlExecutor, PgSchemaReader, SchemaMigrator,
};

/// Schema delta detection and patching for PostgreSQL.
#[derive(Parser)]
#[command(name = "oxide-schema")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string.
    #[arg(short, long, env = "DATABASE_URL")]
    database: String,

    /// JSON file holding the desired tables.
    #[arg(short, long, default_value = "schema.json")]
    schema: PathBuf,

    /// JSON file holding migrator options.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Which changes may be applied (overrides the options file).
    #[arg(short, long, value_enum)]
    auto_create: Option<AutoCreateArg>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show each table's verdict and changed categories.
    Diff {
        /// Print the full deltas as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the DDL that `apply` would execute.
    Patch,

    /// Execute patches allowed by the auto-create policy.
    Apply,

    /// Exit with an error if any table differs from its declaration.
    Assert,
}

#[derive(Clone, Copy, ValueEnum)]
enum AutoCreateArg {
    None,
    CreateOnly,
    CreateOrUpdate,
    All,
}

impl From<AutoCreateArg> for AutoCreate {
    fn from(arg: AutoCreateArg) -> Self {
        match arg {
            AutoCreateArg::None => Self::None,
            AutoCreateArg::CreateOnly => Self::CreateOnly,
            AutoCreateArg::CreateOrUpdate => Self::CreateOrUpdate,
            AutoCreateArg::All => Self::All,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut options = match &cli.config {
        Some(path) => MigratorOptions::from_file(path)?,
        None => MigratorOptions::default(),
    };
    if let Some(auto_create) = cli.auto_create {
        options.auto_create = auto_create.into();
    }
    let tables = load_tables(&cli.schema)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cli.database)
        .await?;
    let migrator = SchemaMigrator::new(
        PgSchemaReader::new(pool.clone()),
        PgDdlExecutor::new(pool),
        options,
    );

    match cli.command {
        Commands::Diff { json } => {
            let plans = migrator.preview(&tables).await?;
            if json {
                let deltas: Vec<_> = plans.iter().map(|p| &p.delta).collect();
                println!("{}", serde_json::to_string_pretty(&deltas)?);
            } else {
                for plan in &plans {
                    print_verdict(plan);
                }
            }
        }

        Commands::Patch => {
            for plan in migrator.preview(&tables).await? {
                if plan.is_noop() {
                    continue;
                }
                println!("-- {} ({})", plan.delta.table, plan.delta.difference);
                if !plan.permitted {
                    println!("-- not allowed by auto-create policy '{}'", options.auto_create);
                }
                for change in &plan.patch.irreconcilable {
                    println!("-- irreconcilable: {change}");
                }
                print!("{}", plan.patch);
                println!();
            }
        }

        Commands::Apply => {
            let applied = migrator.apply(&tables).await?;
            if applied.is_empty() {
                info!("Schema is up to date.");
            }
            for plan in &applied {
                info!(
                    "Applied {} ({}, {} statements)",
                    plan.delta.table,
                    plan.delta.difference,
                    plan.patch.statements.len()
                );
            }
        }

        Commands::Assert => {
            migrator.assert_matches(&tables).await?;
            info!("All {} tables match their declarations.", tables.len());
        }
    }

    Ok(())
}

fn print_verdict(plan: &MigrationPlan) {
    let categories: Vec<String> = plan
        .delta
        .changed_categories()
        .iter()
        .map(ToString::to_string)
        .collect();
    if categories.is_empty() {
        println!("{}: {}", plan.delta.table, plan.delta.difference);
    } else {
        println!(
            "{}: {} ({})",
            plan.delta.table,
            plan.delta.difference,
            categories.join(", ")
        );
    }
    for change in &plan.delta.invalid {
        println!("  - {change}");
    }
}
