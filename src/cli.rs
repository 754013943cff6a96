use std::fs;
use std::io::{self, IsTerminal, Read};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api;
use crate::error::{PlanError, PlanResult};

/// FIRE, multi-currency retirement and market-crisis planning
#[derive(Parser, Debug)]
#[command(name = "wealthplan", version, about)]
pub struct Cli {
    /// Log level for this crate (overridden by RUST_LOG)
    #[arg(long, global = true, env = "WEALTHPLAN_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP JSON API
    Serve(ServeArgs),
    /// Months until financial independence
    Fire(InputArgs),
    /// Multi-currency lifetime retirement projection
    Retirement(InputArgs),
    /// Stress a portfolio under a market crisis
    Crisis(InputArgs),
    /// Solve for the contribution or expense level that meets a FIRE horizon
    Solve(InputArgs),
    /// List the built-in crisis presets
    Presets(OutputArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "WEALTHPLAN_PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "WEALTHPLAN_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,
}

impl ServeArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// JSON payload file; read from stdin when omitted
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Runs every non-server command and returns the rendered JSON.
pub fn execute(command: &Command) -> PlanResult<String> {
    match command {
        Command::Serve(_) => Err(PlanError::invalid(
            "command",
            "serve is handled by the async entry point",
        )),
        Command::Fire(args) => run_with_payload(args, api::fire_response),
        Command::Retirement(args) => run_with_payload(args, api::retirement_response),
        Command::Crisis(args) => run_with_payload(args, api::crisis_response),
        Command::Solve(args) => run_with_payload(args, api::fire_solve_response),
        Command::Presets(output) => render(&api::preset_catalogue(), output.pretty),
    }
}

/// Validation failures exit with 2, everything else with 1.
pub fn exit_code(err: &PlanError) -> i32 {
    match err {
        PlanError::Validation(_) => 2,
        _ => 1,
    }
}

fn run_with_payload<P: DeserializeOwned, T: Serialize>(
    args: &InputArgs,
    build: impl FnOnce(P) -> PlanResult<T>,
) -> PlanResult<String> {
    let raw = read_input(args.input.as_deref())?;
    let payload = parse_payload(&raw)?;
    let response = build(payload)?;
    render(&response, args.output.pretty)
}

fn read_input(path: Option<&Path>) -> PlanResult<String> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "reading payload file");
            fs::read_to_string(path).map_err(|e| {
                PlanError::Io(format!("Failed to read '{}': {e}", path.display()))
            })
        }
        None => read_stdin(),
    }
}

/// An interactive terminal yields an empty payload so every default applies.
fn read_stdin() -> PlanResult<String> {
    if io::stdin().is_terminal() {
        return Ok(String::new());
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn parse_payload<P: DeserializeOwned>(raw: &str) -> PlanResult<P> {
    let trimmed = raw.trim();
    let source = if trimmed.is_empty() { "{}" } else { trimmed };
    Ok(serde_json::from_str(source)?)
}

fn render<T: Serialize>(value: &T, pretty: bool) -> PlanResult<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
