use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

use crate::domain::AccrualPolicy;
use crate::validation::{self, ISSUER_PREFIX_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub account_issuer_prefix: String,
    pub accrual_month: u32,
    pub fixed_penalty_grace_days: u32,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            account_issuer_prefix: env::var("ACCOUNT_ISSUER_PREFIX")
                .unwrap_or_else(|_| "101".to_string()),
            accrual_month: env::var("ACCRUAL_MONTH")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .context("ACCRUAL_MONTH must be a month number")?,
            fixed_penalty_grace_days: env::var("FIXED_PENALTY_GRACE_DAYS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("FIXED_PENALTY_GRACE_DAYS must be a number of days")?,
            log_format: parse_log_format(&env::var("LOG_FORMAT").unwrap_or_default())?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.database_max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
        }
        if !(1..=12).contains(&self.accrual_month) {
            anyhow::bail!("ACCRUAL_MONTH must be between 1 and 12");
        }
        validation::validate_digits(
            "ACCOUNT_ISSUER_PREFIX",
            &self.account_issuer_prefix,
            ISSUER_PREFIX_LEN,
        )?;
        Ok(())
    }

    pub fn accrual_policy(&self) -> AccrualPolicy {
        AccrualPolicy {
            accrual_month: self.accrual_month,
            fixed_penalty_grace_days: self.fixed_penalty_grace_days,
        }
    }
}

fn parse_log_format(raw: &str) -> anyhow::Result<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "pretty" | "text" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
    }
}
