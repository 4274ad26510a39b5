//! # bistro-admin
//!
//! Database administration for Bistro ERP.
//!
//! ## Usage
//! ```bash
//! # Apply pending migrations
//! bistro-admin migrate
//!
//! # Show applied / known migrations
//! bistro-admin status
//!
//! # Default branch, required chart of accounts, bootstrap admin
//! ADMIN_EMAIL=admin@bistro.local ADMIN_PASSWORD=change-me bistro-admin provision
//!
//! # Verify posted entries balance and the account tree is sound
//! bistro-admin check
//! ```
//!
//! `DATABASE_URL` and `DATABASE_SSL` are read from the environment or a
//! `.env` file. `check` exits with status 2 when it finds problems.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bistro_core::DEFAULT_BRANCH;
use bistro_db::maintenance::{self, ProvisionOptions};
use bistro_db::{migrations, Database, DbConfig, EnsureOutcome};

#[derive(Debug, Parser)]
#[command(name = "bistro-admin", version, about = "Bistro ERP database administration")]
struct Cli {
    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Require TLS for the database connection.
    #[arg(long, env = "DATABASE_SSL", default_value_t = false)]
    ssl: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations.
    Migrate,

    /// Show migration status.
    Status,

    /// Create the default branch, required accounts and admin user.
    Provision {
        /// Default branch code.
        #[arg(long, env = "DEFAULT_BRANCH", default_value = DEFAULT_BRANCH)]
        branch: String,

        /// Default branch display name.
        #[arg(long, default_value = "Main Branch")]
        branch_name: String,

        /// Bootstrap admin email.
        #[arg(long, env = "ADMIN_EMAIL")]
        admin_email: Option<String>,

        /// Bootstrap admin password.
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,
    },

    /// Check ledger integrity.
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Optional .env next to the binary's working directory
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,bistro=debug")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let migrate_on_connect = matches!(cli.command, Command::Migrate | Command::Provision { .. });
    let config = DbConfig::new(cli.database_url)
        .ssl(cli.ssl)
        .max_connections(2)
        .run_migrations(migrate_on_connect);

    let db = Database::new(config)
        .await
        .context("connecting to the database")?;

    let code = match cli.command {
        Command::Migrate => {
            let status = migrations::migration_status(db.pool()).await?;
            println!("✓ Migrations applied ({}/{})", status.applied, status.embedded);
            ExitCode::SUCCESS
        }

        Command::Status => {
            let status = migrations::migration_status(db.pool()).await?;
            println!(
                "Migrations: {} applied, {} embedded",
                status.applied, status.embedded
            );
            for (version, description) in &status.pending {
                println!("  pending {:03} {}", version, description);
            }
            if !status.is_current() {
                println!("⚠ run `bistro-admin migrate`");
            }
            ExitCode::SUCCESS
        }

        Command::Provision {
            branch,
            branch_name,
            admin_email,
            admin_password,
        } => {
            let admin = match (admin_email, admin_password) {
                (Some(email), Some(password)) => Some((email, password)),
                (None, None) => None,
                _ => anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be given together"),
            };

            let report = maintenance::provision(
                &db,
                &ProvisionOptions {
                    branch_code: branch.clone(),
                    branch_name,
                    admin,
                },
            )
            .await
            .context("provisioning")?;

            println!(
                "Branch {}: {}",
                branch,
                if report.branch_created { "created" } else { "exists" }
            );
            for account in &report.accounts {
                if account.outcome != EnsureOutcome::Unchanged {
                    println!("  {:<6} {:?}", account.code, account.outcome);
                }
            }
            println!(
                "Accounts: {} created, {} reparented, {} unchanged",
                report.count(EnsureOutcome::Created),
                report.count(EnsureOutcome::Reparented),
                report.count(EnsureOutcome::Unchanged)
            );
            if report.admin_created {
                println!("Admin user created");
            }
            ExitCode::SUCCESS
        }

        Command::Check => {
            let report = maintenance::check_ledger(&db).await.context("checking ledger")?;

            for entry in &report.unbalanced {
                println!(
                    "✗ {} unbalanced: debit {} credit {}",
                    entry.entry_number, entry.debit_cents, entry.credit_cents
                );
            }
            for orphan in &report.orphans {
                println!("✗ account {} has missing parent #{}", orphan.code, orphan.parent_id);
            }
            if !report.cycles.is_empty() {
                println!("✗ accounts on a parent cycle: {:?}", report.cycles);
            }
            for code in &report.missing_required {
                println!("✗ required account {} is missing", code);
            }

            if report.is_clean() {
                println!("✓ Ledger OK");
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
    };

    db.close().await;
    Ok(code)
}
