use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "bol")]
#[command(about = "Brokerage position and balance ledger CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order. Defaults to config/base.yaml when
    /// present, built-in defaults otherwise.
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// Fail instead of warn when the config carries keys nothing reads.
    #[arg(long, global = true, default_value_t = false)]
    strict_config: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Execution report commands
    Exec {
        #[command(subcommand)]
        cmd: ExecCmd,
    },

    /// Project executions into an in-memory book. No database.
    Replay {
        /// JSON array of execution reports, in arrival order
        #[arg(long)]
        file: PathBuf,

        /// Account the executions belong to
        #[arg(long, default_value_t = Uuid::nil())]
        account: Uuid,

        /// Also print every lot row
        #[arg(long, default_value_t = false)]
        lots: bool,
    },

    /// Corporate-action split reconciliation
    Splits {
        #[command(subcommand)]
        cmd: SplitsCmd,
    },

    /// Intraday withdrawable cash, total cash and buying power
    Balances {
        #[arg(long)]
        account: Uuid,

        /// Evaluation instant (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Pattern day trade count, and the PDT decision when equity is given
    DayTrades {
        #[arg(long)]
        account: Uuid,

        /// Evaluation instant (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// JSON file holding one hypothetical order to include
        #[arg(long)]
        pending_file: Option<PathBuf>,

        /// Account equity; enables the PDT decision lines
        #[arg(long)]
        equity: Option<Decimal>,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ExecCmd {
    /// Apply a JSON array of execution reports for one account, in order.
    /// Stops at the first failure; applied executions stay applied.
    Apply {
        #[arg(long)]
        account: Uuid,

        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum SplitsCmd {
    /// Reconcile against the clearing broker's end-of-day position file
    Run {
        /// Processing date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// JSON array of {account_id, symbol, quantity}
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of a JSONL audit log
    Verify {
        #[arg(long)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // dev-time bootstrap; absent file is fine
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = commands::ConfigArgs {
        paths: cli.config_paths,
        strict: cli.strict_config,
    };

    match cli.cmd {
        Commands::Db { cmd } => {
            let engine_cfg = cfg.load()?;
            let url = bol_config::resolve_database_url(&engine_cfg)?;
            let pool =
                bol_db::connect(url.expose(), engine_cfg.database.max_connections).await?;
            match cmd {
                DbCmd::Status => {
                    let s = bol_db::status(&pool).await?;
                    println!("db_ok={} has_positions_table={}", s.ok, s.has_positions_table);
                }
                DbCmd::Migrate => {
                    bol_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => commands::config_hash(&paths, cfg.strict)?,

        Commands::Exec { cmd } => match cmd {
            ExecCmd::Apply { account, file } => {
                commands::ledger::exec_apply(&cfg, account, &file).await?
            }
        },

        Commands::Replay {
            file,
            account,
            lots,
        } => commands::replay::replay(&file, account, lots)?,

        Commands::Splits { cmd } => match cmd {
            SplitsCmd::Run { date, file } => {
                commands::ledger::splits_run(&cfg, date, &file).await?
            }
        },

        Commands::Balances { account, at } => {
            commands::ledger::balances(&cfg, account, at.unwrap_or_else(Utc::now)).await?
        }

        Commands::DayTrades {
            account,
            at,
            pending_file,
            equity,
        } => {
            commands::ledger::day_trades(
                &cfg,
                account,
                at.unwrap_or_else(Utc::now),
                pending_file.as_deref(),
                equity,
            )
            .await?
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => commands::audit_verify(&path)?,
        },
    }

    Ok(())
}
