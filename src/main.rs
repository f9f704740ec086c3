mod cli;

use clap::Parser;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, DbCommands, InterestCommands, RatesCommands};
use teller_ledger::adapters::{PostgresLedgerStore, PostgresRateStore};
use teller_ledger::clock::SystemClock;
use teller_ledger::config::{Config, LogFormat};
use teller_ledger::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Interest(command) => {
            let state = connect(&config).await?;
            match command {
                InterestCommands::Accrue {
                    account_type,
                    late,
                    year,
                    staff,
                } => cli::handle_interest_accrue(&state, account_type, late, year, staff).await,
                InterestCommands::Logs { limit } => cli::handle_interest_logs(&state, limit).await,
            }
        }
        Commands::Rates(command) => {
            let state = connect(&config).await?;
            match command {
                RatesCommands::List => cli::handle_rates_list(&state).await,
                RatesCommands::Set { account_type, rate } => {
                    cli::handle_rates_set(&state, account_type, rate).await
                }
            }
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

async fn connect(config: &Config) -> anyhow::Result<AppState> {
    let pool = db::create_pool(config).await?;
    Ok(build_state(pool, config))
}

fn build_state(pool: PgPool, config: &Config) -> AppState {
    AppState::new(
        Arc::new(PostgresLedgerStore::new(pool.clone())),
        Arc::new(PostgresRateStore::new(pool)),
        Arc::new(SystemClock),
        config.accrual_policy(),
        config.account_issuer_prefix.clone(),
    )
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let app = create_app(build_state(pool, &config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
