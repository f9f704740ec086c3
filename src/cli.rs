use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use teller_ledger::config::Config;
use teller_ledger::domain::AccountType;
use teller_ledger::services::AccrualRequest;
use teller_ledger::AppState;

#[derive(Parser)]
#[command(name = "teller-ledger")]
#[command(about = "Teller Ledger - bank account ledger and interest engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Interest accrual commands
    #[command(subcommand)]
    Interest(InterestCommands),

    /// Interest rate commands
    #[command(subcommand)]
    Rates(RatesCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum InterestCommands {
    /// Post interest for every account of a type
    Accrue {
        /// Account type (savings, fixed)
        #[arg(short = 't', long = "type")]
        account_type: AccountType,

        /// Accrue the previous year outside the accrual month
        #[arg(long)]
        late: bool,

        /// Year to accrue when --late is given
        #[arg(long)]
        year: Option<i32>,

        /// Staff member running the accrual
        #[arg(short, long)]
        staff: String,
    },

    /// List completed accrual runs, newest first
    Logs {
        #[arg(short, long)]
        limit: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum RatesCommands {
    /// Show the configured rate per account type
    List,

    /// Set the annual rate for an account type (0.02 = 2%)
    Set {
        #[arg(value_name = "TYPE")]
        account_type: AccountType,

        #[arg(value_name = "RATE")]
        rate: BigDecimal,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = teller_ledger::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    teller_ledger::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Max Connections: {}", config.database_max_connections);
    println!("  Account Issuer Prefix: {}", config.account_issuer_prefix);
    println!("  Accrual Month: {}", config.accrual_month);
    println!("  FIXED Penalty Grace Days: {}", config.fixed_penalty_grace_days);
    println!("  Log Format: {:?}", config.log_format);

    config.validate()?;

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");
    Ok(())
}

pub async fn handle_interest_accrue(
    state: &AppState,
    account_type: AccountType,
    late: bool,
    year: Option<i32>,
    staff: String,
) -> anyhow::Result<()> {
    let outcome = state
        .accrual
        .accrue(AccrualRequest {
            account_type,
            late_calculation: late,
            target_year: year,
            staff_id: staff,
        })
        .await?;

    println!(
        "✓ Accrued {} at rate {}: {} accounts, {} paid ({} excluded)",
        outcome.period_identifier,
        outcome.rate,
        outcome.accounts_affected,
        outcome.total_interest_paid,
        outcome.accounts_excluded
    );
    Ok(())
}

pub async fn handle_interest_logs(state: &AppState, limit: Option<i64>) -> anyhow::Result<()> {
    let logs = state.accrual.list_logs(limit).await?;

    if logs.is_empty() {
        println!("No accrual runs recorded");
        return Ok(());
    }

    println!("Accrual runs:");
    for log in logs {
        println!(
            "  {} | {} | rate {} | {} accounts | {} paid | by {}",
            log.period_identifier,
            log.executed_at.to_rfc3339(),
            log.rate,
            log.accounts_affected,
            log.total_interest_paid,
            log.staff_id
        );
    }
    Ok(())
}

pub async fn handle_rates_list(state: &AppState) -> anyhow::Result<()> {
    let rates = state.rates.list_rates().await?;

    println!("Interest rates:");
    for account_type in AccountType::ALL {
        match rates.iter().find(|r| r.account_type == account_type) {
            Some(rate) => println!(
                "  {:<8} {} (updated {})",
                account_type,
                rate.rate,
                rate.updated_at.to_rfc3339()
            ),
            None => println!("  {:<8} not configured", account_type),
        }
    }
    Ok(())
}

pub async fn handle_rates_set(
    state: &AppState,
    account_type: AccountType,
    rate: BigDecimal,
) -> anyhow::Result<()> {
    let saved = state.rates.set_rate(account_type, &rate).await?;
    println!("✓ {} rate set to {}", saved.account_type, saved.rate);
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
