/*
[INPUT]:  CLI arguments, YAML configuration file, credential environment variables
[OUTPUT]: Exchange responses printed as JSON
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or startup flow
*/

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spot_connector::{ConnectorError, Method, Params, SpotClient, SyncOutcome};
use spot_connector_cli::ConnectorConfig;

#[derive(Parser, Debug)]
#[command(name = "spot-connector-cli", version, about = "Exchange REST API connector")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check connectivity
    Ping,
    /// Measure the server time offset
    Time,
    /// Send a request to an arbitrary endpoint
    Request {
        #[arg(long, default_value = "GET")]
        method: String,
        path: String,
        /// Query parameters as key=value
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        #[arg(long)]
        signed: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = %args.config_path.display(),
        dry_run = args.dry_run,
        "starting spot-connector"
    );

    let config = load_config(&args.config_path)?;
    info!(
        base_url = %config.base_url,
        use_server_time_offset = config.use_server_time_offset,
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let Some(command) = args.command else {
        bail!("no command given; see --help");
    };

    let client = match config.credentials() {
        Some(credentials) => SpotClient::with_credentials(credentials, config.client_config()),
        None => SpotClient::new(config.client_config()),
    }
    .context("create client")?;

    match command {
        Command::Ping => {
            client.ping().await.context("ping")?;
            println!("pong");
        }
        Command::Time => {
            let outcome = client.sync_time().await.context("sync server time")?;
            if matches!(outcome, SyncOutcome::Disabled) {
                warn!("use_server_time_offset is off; reporting raw server time");
            }
            let server_time = client.server_time().await.context("query server time")?;
            let offset = client.time_offset();
            println!(
                "{}",
                serde_json::json!({
                    "serverTime": server_time.server_time,
                    "offsetMs": offset.offset_ms,
                    "lastSyncMs": offset.last_sync_ms,
                })
            );
        }
        Command::Request {
            method,
            path,
            params,
            signed,
        } => {
            let method: Method = method
                .to_ascii_uppercase()
                .parse()
                .map_err(|err| anyhow!("invalid method {method}: {err}"))?;
            let params = parse_params(&params)?;

            let result: spot_connector::Result<serde_json::Value> = if signed {
                if config.use_server_time_offset {
                    client.sync_time().await.context("sync server time")?;
                }
                client.sign_request(method, &path, &params).await
            } else {
                client.public_request(method, &path, &params).await
            };
            let response = result
                .inspect_err(report_hints)
                .with_context(|| format!("request {path}"))?;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn report_hints(err: &ConnectorError) {
    if err.is_auth_error() {
        warn!("check api_key, api_secret and use_server_time_offset");
    }
    if let Some(delay) = err.retry_delay() {
        warn!(retry_after_secs = delay, "request can be retried");
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<ConnectorConfig> {
    let path_str = path
        .to_str()
        .context("config path must be valid utf-8")?;
    ConnectorConfig::from_file(path_str)
        .map(ConnectorConfig::with_env_credentials)
        .context("load config")
}

fn parse_params(raw: &[String]) -> Result<Params> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .with_context(|| format!("parameter {pair} is not key=value"))
        })
        .collect::<Result<Vec<_>>>()
        .map(|pairs| pairs.into_iter().collect())
}
