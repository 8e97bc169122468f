//! `form-mapper` CLI entry-point.
//!
//! Available sub-commands:
//! - `migrate`    — run pending database migrations.
//! - `create`     — create a mapper from a JSON field bag.
//! - `active`     — list active mappers visible to a tenant.
//! - `count`      — count active mappers.
//! - `latest`     — show the latest mapper id of every form lineage.
//! - `show`       — print one mapper.
//! - `unpublish`  — set a mapper inactive.
//! - `deactivate` — set a mapper inactive and soft-delete it.

use anyhow::Context;
use clap::{Parser, Subcommand};
use db::repository::form_process_mappers::{self as repo, ActiveMapperListing};
use db::{MapperFilter, Pagination, Sort, UserContext};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "form-mapper",
    about = "Inspect and maintain form process mappers",
    version
)]
struct Cli {
    /// Database connection string.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite://formsflow.db?mode=rwc"
    )]
    database_url: String,

    /// Connection pool ceiling.
    #[arg(long, global = true, default_value_t = 5)]
    max_connections: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending database migrations.
    Migrate,
    /// Create a mapper from a JSON file holding the field bag.
    Create {
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// List active mappers.
    Active {
        /// Tenant of the caller; omit for a global caller.
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        /// Page size; omit to list everything.
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        sort_order: Option<String>,
        /// Case-insensitive match on the form name.
        #[arg(long)]
        form_name: Option<String>,
        /// Restrict to these process keys.
        #[arg(long = "process-key")]
        process_keys: Vec<String>,
    },
    /// Count active mappers.
    Count,
    /// Show the latest mapper id of every form lineage.
    Latest,
    /// Print one mapper by id.
    Show { id: i64 },
    /// Set a mapper inactive, keeping it listed.
    Unpublish { id: i64 },
    /// Set a mapper inactive and soft-delete it.
    Deactivate { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let pool = db::pool::create_pool(&cli.database_url, cli.max_connections)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Command::Migrate => {
            info!("Running migrations against {}", cli.database_url);
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Create { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read file {}", file.display()))?;
            let fields: serde_json::Value =
                serde_json::from_str(&content).context("invalid JSON")?;

            match repo::create_from_dict(&pool, &fields).await {
                Ok(row) => println!("{}", serde_json::to_string_pretty(&row)?),
                Err(rejection) => {
                    eprintln!("{}", serde_json::to_string_pretty(&rejection)?);
                    std::process::exit(1);
                }
            }
        }
        Command::Active {
            tenant,
            page,
            limit,
            sort_by,
            sort_order,
            form_name,
            process_keys,
        } => {
            let ctx = UserContext {
                tenant_key: tenant,
                user_name: None,
            };
            let listing = ActiveMapperListing {
                pagination: Pagination::from_params(page, limit),
                sort: Sort::validate(sort_by.as_deref(), sort_order.as_deref()),
                process_keys: (!process_keys.is_empty()).then_some(process_keys),
                filters: form_name.map(MapperFilter::FormName).into_iter().collect(),
            };
            let result = repo::find_all_active(&pool, &ctx, listing).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Count => {
            println!("{}", repo::find_all_count(&pool).await?);
        }
        Command::Latest => {
            let latest = repo::get_latest_form_mapper_ids(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&latest)?);
        }
        Command::Show { id } => match repo::find_form_by_id(&pool, id).await? {
            Some(row) => println!("{}", serde_json::to_string_pretty(&row)?),
            None => anyhow::bail!("mapper {id} not found"),
        },
        Command::Unpublish { id } => {
            repo::mark_unpublished(&pool, id).await?;
            info!("Mapper {id} unpublished");
        }
        Command::Deactivate { id } => {
            repo::mark_inactive(&pool, id).await?;
            info!("Mapper {id} marked inactive");
        }
    }

    Ok(())
}
