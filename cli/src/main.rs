use std::sync::Arc;

use clap::{Parser, Subcommand};
use community_auth::backend::GraphqlBackend;
use community_auth::error::{BackendError, ConfigError};
use community_auth::token_manager::{PHONE_VERIFIED_COOKIE, SESSION_COOKIE};
use community_auth::{AuthConfig, Machine, Signal, SsrAuthResolver, Transition, guard_decision};
use reqwest::header::{COOKIE, HeaderValue};
use serde_json::Value;

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}")]
    ServerError { status: u16 },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("unrecognized signal `{0}`")]
    UnknownSignal(String),
}

#[derive(Parser, Debug)]
#[command(name = "auth-cli", about = "Community auth snapshot and state machine CLI")]
struct Cli {
    #[arg(long, env = "AUTH_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Resolve the SSR snapshot for a session cookie.
    Snapshot {
        #[arg(long, env = "AUTH_SESSION_TOKEN")]
        session: Option<String>,
        #[arg(long)]
        phone_flag: Option<String>,
        /// Query the GraphQL backend directly (reads `AUTH_*` env) instead of the server.
        #[arg(long, default_value_t = false)]
        direct: bool,
    },
    /// Fold signals (`line:true`, `phone:true`, `expired:line`, `logout`, ...)
    /// through the state machine from `unauthenticated`.
    Replay {
        #[arg(required = true)]
        signals: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.base_url).await,
        Command::Snapshot { session, phone_flag, direct } => {
            let snapshot = if direct {
                resolve_direct(session.as_deref(), phone_flag.as_deref()).await?
            } else {
                fetch_snapshot(&cli.base_url, session.as_deref(), phone_flag.as_deref()).await?
            };
            print_json(&snapshot)
        }
        Command::Replay { signals } => {
            for line in replay_lines(&signals)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16() });
    }
    println!("ok");
    Ok(())
}

async fn fetch_snapshot(base_url: &str, session: Option<&str>, phone_flag: Option<&str>) -> Result<Value, CliError> {
    let url = format!("{}/api/auth/snapshot", base_url.trim_end_matches('/'));
    let mut request = reqwest::Client::new().get(url);
    if let Some(cookie) = cookie_header(session, phone_flag) {
        request = request.header(COOKIE, HeaderValue::from_str(&cookie)?);
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16() });
    }
    Ok(response.json().await?)
}

async fn resolve_direct(session: Option<&str>, phone_flag: Option<&str>) -> Result<Value, CliError> {
    let config = AuthConfig::from_env()?;
    let backend = GraphqlBackend::new(config.graphql_url.clone(), config.timeouts)?;
    let resolver = SsrAuthResolver::new(Arc::new(backend), config.active_community_id);
    let snapshot = resolver.resolve(session, phone_flag).await;
    Ok(serde_json::to_value(snapshot)?)
}

fn cookie_header(session: Option<&str>, phone_flag: Option<&str>) -> Option<String> {
    let pairs: Vec<String> = [(SESSION_COOKIE, session), (PHONE_VERIFIED_COOKIE, phone_flag)]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| format!("{name}={v}")))
        .collect();
    (!pairs.is_empty()).then(|| pairs.join("; "))
}

/// One line per signal: `signal -> outcome (state, guard)`.
fn replay_lines(raw: &[String]) -> Result<Vec<String>, CliError> {
    let mut machine = Machine::default();
    let mut lines = Vec::with_capacity(raw.len() + 1);
    lines.push(format!("start {}", machine.state));
    for item in raw {
        let signal = Signal::parse(item).ok_or_else(|| CliError::UnknownSignal(item.clone()))?;
        let outcome = match machine.apply(signal) {
            Transition::Move(_) => "move".to_owned(),
            Transition::Reset => "reset".to_owned(),
            Transition::Unchanged => "unchanged".to_owned(),
            Transition::Rejected(violation) => format!("rejected: {violation}"),
        };
        lines.push(format!(
            "{signal} -> {} [{outcome}] guard={:?}",
            machine.state,
            guard_decision(machine.state)
        ));
    }
    Ok(lines)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
