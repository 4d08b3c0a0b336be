use anyhow::{anyhow, Result};
use clap::Parser;
use std::env;

use crate::connection::find_preset;

/// antelopex - Antelope chain explorer
///
/// Looks up accounts, blocks, transactions, contract tables and actions on
/// an Antelope (EOS, WAX, Telos, ...) chain.
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Parser, Debug, Default)]
#[command(name = "antelopex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Antelope chain explorer", long_about = None)]
pub struct CliArgs {
    /// Preset chain to connect to (key or name, e.g. "waxmainnet")
    #[arg(short, long, env = "ANTELOPE_CHAIN")]
    pub chain: Option<String>,

    /// Chain API endpoint URL (overrides --chain)
    #[arg(short, long, env = "ANTELOPE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Hyperion history endpoint used for transaction lookups
    #[arg(long, env = "HYPERION_ENDPOINT")]
    pub history_endpoint: Option<String>,

    /// RPC request timeout in milliseconds (1000-60000)
    #[arg(long, env = "RPC_TIMEOUT_MS")]
    pub rpc_timeout_ms: Option<u64>,

    /// Number of retry attempts for failed RPC requests (0-10)
    #[arg(long, env = "RPC_RETRIES")]
    pub rpc_retries: Option<u32>,

    /// Rows fetched per table page (1-1000)
    #[arg(long, env = "TABLE_LIMIT")]
    pub table_limit: Option<u32>,

    /// Path to SQLite database holding the remembered connection
    #[arg(long, env = "SESSION_DB_PATH")]
    pub session_db_path: Option<String>,

    /// Deep link query string to open (e.g. "?chain=waxmainnet&account=alice")
    #[arg(long, env = "ANTELOPEX_LINK")]
    pub link: Option<String>,

    /// Account name, block number or transaction id
    pub query: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub chain: Option<String>,
    pub endpoint: Option<String>,
    pub history_endpoint: Option<String>,
    pub rpc_timeout_ms: u64,
    pub rpc_retries: u32,
    pub table_limit: u32,
    pub session_db_path: String,
    pub link: Option<String>,
    pub query: Option<String>,
}

fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Load configuration from CLI args and environment variables
/// Priority: CLI args > Environment variables > Defaults
pub fn load() -> Result<Config> {
    from_args(CliArgs::parse())
}

pub fn from_args(args: CliArgs) -> Result<Config> {
    let chain = non_blank(args.chain.or_else(|| env::var("ANTELOPE_CHAIN").ok()));
    if let Some(ref chain) = chain {
        if find_preset(chain).is_none() {
            return Err(anyhow!("ANTELOPE_CHAIN '{chain}' is not a known chain preset"));
        }
    }

    let endpoint = non_blank(args.endpoint.or_else(|| env::var("ANTELOPE_ENDPOINT").ok()));
    if let Some(ref url) = endpoint {
        validate_url(url, "ANTELOPE_ENDPOINT")?;
    }

    let history_endpoint = non_blank(
        args.history_endpoint
            .or_else(|| env::var("HYPERION_ENDPOINT").ok()),
    );
    if let Some(ref url) = history_endpoint {
        validate_url(url, "HYPERION_ENDPOINT")?;
    }

    let rpc_timeout_ms = args
        .rpc_timeout_ms
        .or_else(|| env_parsed("RPC_TIMEOUT_MS"))
        .unwrap_or(8000);
    let rpc_timeout_ms = validate_in_range(rpc_timeout_ms, 1000, 60000, "RPC_TIMEOUT_MS")?;

    let rpc_retries = args
        .rpc_retries
        .or_else(|| env_parsed("RPC_RETRIES"))
        .unwrap_or(2);
    let rpc_retries = validate_in_range(rpc_retries, 0, 10, "RPC_RETRIES")?;

    let table_limit = args
        .table_limit
        .or_else(|| env_parsed("TABLE_LIMIT"))
        .unwrap_or(crate::resolver::DEFAULT_TABLE_LIMIT);
    let table_limit = validate_in_range(table_limit, 1, 1000, "TABLE_LIMIT")?;

    let session_db_path = non_blank(
        args.session_db_path
            .or_else(|| env::var("SESSION_DB_PATH").ok()),
    )
    .unwrap_or_else(|| "./antelopex_session.db".to_string());

    Ok(Config {
        chain,
        endpoint,
        history_endpoint,
        rpc_timeout_ms,
        rpc_retries,
        table_limit,
        session_db_path,
        link: non_blank(args.link.or_else(|| env::var("ANTELOPEX_LINK").ok())),
        query: non_blank(args.query),
    })
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

impl Config {
    pub fn print_summary(&self) {
        log::info!("antelopex configuration:");
        match (&self.endpoint, &self.chain) {
            (Some(endpoint), _) => log::info!("  Endpoint: {endpoint}"),
            (None, Some(chain)) => log::info!("  Chain preset: {chain}"),
            (None, None) => log::info!("  Connection: restored from {}", self.session_db_path),
        }
        if let Some(ref history) = self.history_endpoint {
            log::info!("  History endpoint: {history}");
        }
        log::info!("  RPC Timeout: {}ms", self.rpc_timeout_ms);
        log::info!("  RPC Retries: {}", self.rpc_retries);
        log::info!("  Table page size: {}", self.table_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("antelopex").chain(argv.iter().copied()))
    }

    #[test]
    fn flags_override_defaults() {
        let config = from_args(args(&[
            "--chain",
            "waxmainnet",
            "--history-endpoint",
            "https://wax.eosphere.io",
            "--table-limit",
            "50",
            "eosio.token",
        ]))
        .unwrap();
        assert_eq!(config.chain.as_deref(), Some("waxmainnet"));
        assert_eq!(config.history_endpoint.as_deref(), Some("https://wax.eosphere.io"));
        assert_eq!(config.table_limit, 50);
        assert_eq!(config.query.as_deref(), Some("eosio.token"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = from_args(args(&["--rpc-timeout-ms", "10"])).unwrap_err();
        assert!(err.to_string().contains("RPC_TIMEOUT_MS"));
        let err = from_args(args(&["--table-limit", "0"])).unwrap_err();
        assert!(err.to_string().contains("TABLE_LIMIT"));
    }

    #[test]
    fn endpoints_and_presets_are_checked() {
        assert!(from_args(args(&["--endpoint", "ftp://example.com"])).is_err());
        assert!(from_args(args(&["--chain", "notachain"])).is_err());
        assert!(from_args(args(&["--chain", "WAX Mainnet"])).is_ok());
    }

    #[test]
    fn range_check_is_inclusive() {
        assert_eq!(validate_in_range(1, 1, 10, "X").unwrap(), 1);
        assert_eq!(validate_in_range(10, 1, 10, "X").unwrap(), 10);
        assert!(validate_in_range(11, 1, 10, "X").is_err());
    }
}
